//! 核心层：启动期错误与凭据

pub mod credentials;
pub mod error;

pub use credentials::{Credentials, FALLBACK_KEY_ENV, PRIMARY_KEY_ENV};
pub use error::TantrikError;
