//! 基础设施层（Infrastructure）
//!
//! 持有稀缺资源（Page），只暴露驱动能力

pub mod chromium;
pub mod driver;

pub use chromium::ChromiumDriver;
pub use driver::{
    BrowserDriver, CookieEntry, ElementHandle, PageCapture, SubmissionRequest, SubmissionRewriter,
};
