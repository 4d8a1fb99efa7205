//! # Commands Module / 命令模块
//!
//! One module per subcommand.
//!
//! 每个子命令一个模块。

pub mod flatten;
pub mod init;
pub mod issues;
pub mod run;
pub mod uninstall;
