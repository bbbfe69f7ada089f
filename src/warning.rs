//! Warnings attributed to the sync unit (page or collection) being processed.
//!
//! Non-fatal problems found deep in the pipeline, such as an unresolved image
//! asset or reference, are recorded against the unit in scope. The same
//! problem hit twice within a unit is kept once, so an asset missing from
//! every card of a page yields a single warning.

use std::{cell::RefCell, fmt};

use indexmap::IndexSet;

/// The pipeline stage a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningSource {
    Asset,
    Reference,
    Component,
    Markup,
}

impl fmt::Display for WarningSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningSource::Asset => write!(f, "asset"),
            WarningSource::Reference => write!(f, "reference"),
            WarningSource::Component => write!(f, "component"),
            WarningSource::Markup => write!(f, "markup"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitWarning {
    pub source: WarningSource,
    pub message: String,
}

impl UnitWarning {
    pub fn new(source: WarningSource, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
        }
    }
}

impl fmt::Display for UnitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

tokio::task_local! {
    static WARNINGS: RefCell<IndexSet<UnitWarning>>;
}

/// Records a warning for the unit in scope. Outside of a unit it is only logged.
pub fn collect(source: WarningSource, message: String) {
    let warning = UnitWarning::new(source, message);
    if WARNINGS
        .try_with(|warnings| warnings.borrow_mut().insert(warning.clone()))
        .is_err()
    {
        tracing::debug!(%warning, "warning raised outside of a sync unit");
    }
}

/// Runs one unit, returning its result and the distinct warnings it raised in
/// the order they were first seen.
pub async fn collect_warnings<F, T>(unit: F) -> (T, Vec<UnitWarning>)
where
    F: std::future::Future<Output = T>,
{
    WARNINGS
        .scope(RefCell::new(IndexSet::new()), async {
            let result = unit.await;
            let warnings = WARNINGS.with(|w| w.take().into_iter().collect());
            (result, warnings)
        })
        .await
}

/// `warn_unit!(Asset, "asset {id} missing")`
#[macro_export]
macro_rules! warn_unit {
    ($source:ident, $($arg:tt)*) => {
        $crate::warning::collect(
            $crate::warning::WarningSource::$source,
            format!($($arg)*),
        )
    };
}
