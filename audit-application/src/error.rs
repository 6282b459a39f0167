use audit_domain::error::AuditError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("audit: {0}")]
    Audit(#[from] AuditError),

    /// 引擎内部失败：对本子系统只表现为回滚结局，原因原样上抛给调用方
    #[error("engine: {reason}")]
    Engine { reason: String },
}

impl AppError {
    pub fn engine(reason: impl Into<String>) -> Self {
        AppError::Engine {
            reason: reason.into(),
        }
    }
}
