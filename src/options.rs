//! Reader options.

use std::rc::Rc;

use serde::Deserialize;

use crate::budget::{Budget, BudgetReport};
use crate::types::OBJECT_TYPE;

pub type BudgetReportCallback = Rc<std::cell::RefCell<dyn FnMut(BudgetReport) + 'static>>;

/// Document reader configuration.
///
/// Use this to configure the content [`Budget`], the expected document shape
/// and an optional callback receiving the budget report.
///
/// ```rust
/// use content_intermediate::{from_str_with_options, Budget, Options, TypeRegistry};
///
/// let doc = r#"
/// <Level>
///   <Data Type="int">3</Data>
/// </Level>
/// "#;
///
/// let options = Options {
///     budget: Some(Budget { max_depth: 8, ..Budget::default() }),
///     root_element: Some("Level".to_owned()),
///     asset_element: "Data".to_owned(),
///     ..Options::default()
/// };
///
/// let registry = TypeRegistry::new();
/// let graph = from_str_with_options(doc, "level.xml", &registry, options).unwrap();
/// assert_eq!(graph.root().as_i32(), Some(3));
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Budget enforced while reading. `None` disables all limits.
    pub budget: Option<Budget>,
    /// Optional function invoked with the final budget report.
    /// It is invoked both when reading succeeds and when the budget was breached.
    #[serde(skip)]
    pub budget_report: Option<fn(&BudgetReport)>,
    /// Closure form of `budget_report`.
    #[serde(skip)]
    pub budget_report_cb: Option<BudgetReportCallback>,
    /// Required name of the root element. `None` accepts any name.
    pub root_element: Option<String>,
    /// Name of the element holding the primary object. Default: `Asset`.
    pub asset_element: String,
    /// Declared type of the primary object. Default: `System.Object`, so the
    /// document's `Type` attribute decides.
    pub asset_type: String,
}

impl Options {
    /// Registers a budget-report callback. Any closure can be used, including
    /// ones that capture state from the surrounding scope.
    ///
    /// ```rust
    /// use content_intermediate::Options;
    /// use content_intermediate::budget::BudgetReport;
    ///
    /// let options = Options::default().with_budget_report(|report: BudgetReport| {
    ///     let _ = report.nodes;
    /// });
    /// ```
    pub fn with_budget_report<F>(mut self, cb: F) -> Self
    where
        F: FnMut(BudgetReport) + 'static,
    {
        self.budget_report_cb = Some(Rc::new(std::cell::RefCell::new(cb)));
        self
    }

    pub(crate) fn report(&self, report: BudgetReport) {
        if let Some(report_fn) = self.budget_report {
            report_fn(&report);
        }
        if let Some(cb) = &self.budget_report_cb {
            (cb.borrow_mut())(report);
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            budget: Some(Budget::default()),
            budget_report: None,
            budget_report_cb: None,
            root_element: None,
            asset_element: "Asset".to_owned(),
            asset_type: OBJECT_TYPE.to_owned(),
        }
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("budget", &self.budget)
            .field("budget_report", &self.budget_report)
            .field("budget_report_cb", &if self.budget_report_cb.is_some() { "set" } else { "none" })
            .field("root_element", &self.root_element)
            .field("asset_element", &self.asset_element)
            .field("asset_type", &self.asset_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_deserialize_with_defaults() {
        let options: Options =
            serde_json::from_str(r#"{ "root_element": "XnaContent", "budget": { "max_depth": 5 } }"#).unwrap();
        assert_eq!(options.root_element.as_deref(), Some("XnaContent"));
        assert_eq!(options.asset_element, "Asset");
        assert_eq!(options.asset_type, OBJECT_TYPE);
        assert_eq!(options.budget.map(|b| b.max_depth), Some(5));
    }

    #[test]
    fn budget_can_be_disabled() {
        let options: Options = serde_json::from_str(r#"{ "budget": null }"#).unwrap();
        assert!(options.budget.is_none());
    }
}
