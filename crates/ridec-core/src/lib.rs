//! RIDEC コア
//!
//! プロセス (RI → D → E → C + Stage A) の定義、ステージタイマーの状態遷移、
//! ダッシュボード集計など、I/O を伴わないドメインロジックをまとめる。

pub mod book;
pub mod dashboard;
pub mod error;
pub mod flow;
pub mod form;
pub mod format;
pub mod machine;
pub mod model;
pub mod overdue;

pub use book::{ChangeSet, Deletion, RecordBook};
pub use error::{Result, RidecError};
pub use form::{FieldError, FormStep, FormWizard, TemplateDraft, ValidationErrors};
pub use machine::{StageState, StageTransition};
pub use model::*;
