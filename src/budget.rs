//! Streaming content budget checker.
//!
//! The cursor feeds every markup node it pulls into a [`BudgetEnforcer`], which
//! stops pathological inputs (deep nesting, element storms, huge text) before the
//! reader builds anything from them.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::xml::XmlCursor;

/// Budgets for reading one document.
///
/// The defaults are intentionally permissive for typical content documents while
/// stopping obvious resource-amplifying inputs. Budgets can be loaded from
/// configuration; missing fields keep their defaults.
///
/// ```rust
/// use content_intermediate::{Budget, Options, TypeRegistry};
///
/// let options = Options {
///     budget: Some(Budget { max_depth: 16, ..Budget::default() }),
///     ..Options::default()
/// };
/// let registry = TypeRegistry::new();
/// let doc = "<XnaContent><Asset>5</Asset></XnaContent>";
/// let graph = content_intermediate::from_str_with_options(doc, "level.xml", &registry, options).unwrap();
/// assert_eq!(graph.root().as_i32(), Some(5));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Budget {
    /// Maximum number of markup nodes (element starts, element ends, text runs).
    ///
    /// Default: 1,000,000
    pub max_nodes: usize,
    /// Maximum element nesting depth.
    ///
    /// Objects nested deeper than [`crate::MAX_OBJECT_NESTING`] are rejected
    /// by the reader even when this allows more.
    ///
    /// Default: 100
    pub max_depth: usize,
    /// Maximum number of attributes on a single element.
    ///
    /// Default: 256
    pub max_attributes: usize,
    /// Maximum total bytes of text content across the document.
    ///
    /// Default: 67,108,864 (64 MiB)
    pub max_total_text_bytes: usize,
    /// Maximum number of `Resource` definitions.
    ///
    /// Default: 50,000
    pub max_shared_resources: usize,
    /// Maximum number of `ExternalReference` definitions.
    ///
    /// Default: 50,000
    pub max_external_references: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_nodes: 1_000_000,
            max_depth: 100,
            max_attributes: 256,
            max_total_text_bytes: 64 * 1024 * 1024,
            max_shared_resources: 50_000,
            max_external_references: 50_000,
        }
    }
}

/// What tripped the budget (if anything).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum BudgetBreach {
    /// The number of markup nodes exceeded [`Budget::max_nodes`].
    Nodes { nodes: usize },
    /// The nesting depth exceeded [`Budget::max_depth`].
    Depth { depth: usize },
    /// One element carried more than [`Budget::max_attributes`] attributes.
    Attributes { attributes: usize },
    /// The cumulative text size exceeded [`Budget::max_total_text_bytes`].
    TextBytes { total_text_bytes: usize },
    /// More `Resource` definitions than [`Budget::max_shared_resources`].
    SharedResources { resources: usize },
    /// More `ExternalReference` definitions than [`Budget::max_external_references`].
    ExternalReferences { references: usize },
    /// An end tag was seen without a matching start tag.
    Unbalanced,
}

/// Summary of the markup seen so far (even if no breach).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BudgetReport {
    /// `Some(..)` if a limit was exceeded; `None` if all budgets were respected.
    pub breached: Option<BudgetBreach>,
    /// Total number of markup nodes observed.
    pub nodes: usize,
    /// Number of elements (empty or not).
    pub elements: usize,
    /// Maximum nesting depth reached.
    pub max_depth: usize,
    /// Sum of text bytes, saturating on overflow.
    pub total_text_bytes: usize,
}

/// One markup node as seen by the budget.
#[derive(Clone, Copy, Debug)]
pub enum Markup<'t> {
    /// Element start. Self-closing elements report `empty: true` and no matching end.
    Start { attributes: usize, empty: bool },
    End,
    Text(&'t str),
}

/// Stateful helper that enforces a [`Budget`] while consuming markup nodes.
#[derive(Debug)]
pub struct BudgetEnforcer {
    budget: Budget,
    report: BudgetReport,
    depth: usize,
}

impl BudgetEnforcer {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            report: BudgetReport::default(),
            depth: 0,
        }
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    /// Observe a markup node, updating the internal counters.
    ///
    /// Returns `Err(BudgetBreach)` as soon as a limit is exceeded. The breach is
    /// also recorded in the report.
    pub fn observe(&mut self, markup: &Markup<'_>) -> Result<(), BudgetBreach> {
        let result = self.observe_inner(markup);
        if let Err(breach) = &result {
            self.report.breached = Some(breach.clone());
        }
        result
    }

    fn observe_inner(&mut self, markup: &Markup<'_>) -> Result<(), BudgetBreach> {
        self.report.nodes += 1;
        if self.report.nodes > self.budget.max_nodes {
            return Err(BudgetBreach::Nodes {
                nodes: self.report.nodes,
            });
        }

        match *markup {
            Markup::Start { attributes, empty } => {
                self.report.elements += 1;
                if attributes > self.budget.max_attributes {
                    return Err(BudgetBreach::Attributes { attributes });
                }
                let depth = self.depth + 1;
                if depth > self.report.max_depth {
                    self.report.max_depth = depth;
                }
                if depth > self.budget.max_depth {
                    return Err(BudgetBreach::Depth { depth });
                }
                if !empty {
                    self.depth = depth;
                }
            }
            Markup::End => {
                self.depth = self
                    .depth
                    .checked_sub(1)
                    .ok_or(BudgetBreach::Unbalanced)?;
            }
            Markup::Text(text) => {
                self.report.total_text_bytes = self.report.total_text_bytes.saturating_add(text.len());
                if self.report.total_text_bytes > self.budget.max_total_text_bytes {
                    return Err(BudgetBreach::TextBytes {
                        total_text_bytes: self.report.total_text_bytes,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn report(&self) -> &BudgetReport {
        &self.report
    }

    pub fn finalize(self) -> BudgetReport {
        self.report
    }
}

/// Scan a whole document against `budget` without building an object graph.
///
/// Returns the report (with `breached` set when a limit tripped). Malformed
/// markup is an error.
pub fn check_budget(input: &str, budget: &Budget) -> Result<BudgetReport, Error> {
    let mut cursor = XmlCursor::with_budget(input, Some(budget.clone()));
    match cursor.scan_to_end() {
        Ok(()) => {}
        Err(err) if err.kind() == crate::ErrorKind::Budget => {}
        Err(err) => return Err(err),
    }
    Ok(cursor.into_budget_report().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_document_ok() {
        let b = Budget::default();
        let doc = "<Root><A>1</A><B/></Root>";
        let r = check_budget(doc, &b).unwrap();
        assert!(r.breached.is_none());
        assert_eq!(r.elements, 3);
        assert_eq!(r.max_depth, 2);
        assert_eq!(r.total_text_bytes, 1);
    }

    #[test]
    fn nesting_trips_depth_limit() {
        let doc = "<A><B><C><D/></C></B></A>";
        let mut b = Budget::default();
        b.max_depth = 3;

        let rep = check_budget(doc, &b).unwrap();
        assert_eq!(rep.breached, Some(BudgetBreach::Depth { depth: 4 }));
    }

    #[test]
    fn text_bytes_are_summed_across_nodes() {
        let doc = "<A><B>12345</B><C>678</C></A>";
        let mut b = Budget::default();
        b.max_total_text_bytes = 6;

        let rep = check_budget(doc, &b).unwrap();
        assert_eq!(
            rep.breached,
            Some(BudgetBreach::TextBytes {
                total_text_bytes: 8
            })
        );
    }

    #[test]
    fn malformed_markup_is_an_error_not_a_breach() {
        let err = check_budget("<A><B></A>", &Budget::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Syntax);
    }

    #[test]
    fn enforcer_detects_unbalanced_end() {
        let mut enforcer = BudgetEnforcer::new(Budget::default());
        assert_eq!(enforcer.observe(&Markup::End), Err(BudgetBreach::Unbalanced));
        assert_eq!(enforcer.finalize().breached, Some(BudgetBreach::Unbalanced));
    }

    #[test]
    fn budget_deserializes_with_defaults_for_missing_fields() {
        let budget: Budget = serde_json::from_str(r#"{ "max_depth": 12 }"#).unwrap();
        assert_eq!(budget.max_depth, 12);
        assert_eq!(budget.max_nodes, Budget::default().max_nodes);
    }
}
