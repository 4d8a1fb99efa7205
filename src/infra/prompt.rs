//! # Operator Prompt Module / 操作员提示模块
//!
//! Questions to the operator go through the [`Operator`] trait, so a run under
//! `PromptOperator` or `CollisionPolicy::Prompt` stays testable.
//!
//! 向操作员的提问通过 [`Operator`] trait 进行，使提示策略下的运行仍可测试。

use dialoguer::{Confirm, theme::ColorfulTheme};

use crate::core::error::{MatrixError, MatrixResult};

/// Answers yes/no questions during a run.
pub trait Operator: Send + Sync {
    fn confirm(&self, question: &str) -> MatrixResult<bool>;
}

/// Asks on the terminal. Defaults to "no" so that pressing enter never
/// destroys anything.
///
/// 在终端提问。默认回答为“否”，因此直接按回车不会删除任何内容。
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn confirm(&self, question: &str) -> MatrixResult<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .default(false)
            .interact()
            .map_err(|e| MatrixError::Aborted(format!("no answer from operator: {e}")))
    }
}
