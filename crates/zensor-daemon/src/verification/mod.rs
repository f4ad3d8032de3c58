mod service;

pub use service::{
    RejectReason, Verdict, VerificationService, VerificationStats, VerificationStatsSnapshot,
};
