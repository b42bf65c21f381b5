//! Gauntlet parameter-space builder
//!
//! A declarative pipeline that expands into a deduplicated, order-preserving
//! sequence of parameter records. The pipeline is stored as a tagged list of
//! steps and replayed lazily: records are produced on demand, never
//! materialized as a whole, and iterating twice yields the same sequence.
//!
//! ```
//! use gauntlet_params::params;
//!
//! let cases: Vec<_> = params()
//!     .combine("x", [1i64, 2])
//!     .combine("y", ["a", "b"])
//!     .unless(|record| {
//!         record.get("x") == Some(&gauntlet_query::ParamValue::Int(2))
//!             && record.get("y") == Some(&"b".into())
//!     })
//!     .iter_cases()
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//! assert_eq!(cases.len(), 3);
//! ```

use gauntlet_query::{ParamRecord, ParamValue};
use std::sync::Arc;
use thiserror::Error;

/// Errors produced while expanding a parameter pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("duplicate param key `{key}` while merging pipeline records")]
    DuplicateKey { key: String },
}

type ExpandFn = Arc<dyn Fn(&ParamRecord) -> Vec<ParamValue> + Send + Sync>;
type ExpandParamsFn = Arc<dyn Fn(&ParamRecord) -> Vec<ParamRecord> + Send + Sync>;
type PredicateFn = Arc<dyn Fn(&ParamRecord) -> bool + Send + Sync>;

/// One pipeline step, replayed lazily on every iteration.
#[derive(Clone)]
enum Step {
    Combine { name: String, values: Vec<ParamValue> },
    Expand { name: String, expander: ExpandFn },
    ExpandWithParams { expander: ExpandParamsFn },
    Filter { pred: PredicateFn, keep_when: bool },
}

/// One fully expanded test case: its identifying params plus the subcase
/// records declared after `begin_subcases()`.
///
/// Subcase records hold only the fields added after the boundary; an empty
/// list means the case has no subcases and runs once.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSpec {
    pub params: ParamRecord,
    pub subcases: Vec<ParamRecord>,
}

/// Start an empty pipeline.
pub fn params() -> ParamsBuilder {
    ParamsBuilder::new()
}

/// A one-dimension pipeline seeded with `name` over `values`.
pub fn options(
    name: impl Into<String>,
    values: impl IntoIterator<Item = impl Into<ParamValue>>,
) -> ParamsBuilder {
    params().combine(name, values)
}

/// A one-dimension boolean pipeline: `false`, then `true`.
pub fn booleans(name: impl Into<String>) -> ParamsBuilder {
    options(name, [false, true])
}

/// Fluent builder for a parameter space
///
/// Steps before `begin_subcases()` identify the case name; steps after it
/// produce subcases that share one case name but are reported independently.
#[derive(Clone, Default)]
pub struct ParamsBuilder {
    case_steps: Vec<Step>,
    subcase_steps: Vec<Step>,
    in_subcases: bool,
}

impl ParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, step: Step) {
        if self.in_subcases {
            self.subcase_steps.push(step);
        } else {
            self.case_steps.push(step);
        }
    }

    /// Cartesian product: for every accumulated record and every value,
    /// emit the record extended with `name = value`.
    pub fn combine(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<ParamValue>>,
    ) -> Self {
        self.push(Step::Combine {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Data-dependent fan-out of a single new field: `expander` may read the
    /// fields chosen so far and return the valid values for `name`.
    pub fn expand(
        mut self,
        name: impl Into<String>,
        expander: impl Fn(&ParamRecord) -> Vec<ParamValue> + Send + Sync + 'static,
    ) -> Self {
        self.push(Step::Expand {
            name: name.into(),
            expander: Arc::new(expander),
        });
        self
    }

    /// Data-dependent fan-out that may add several fields at once.
    pub fn expand_with_params(
        mut self,
        expander: impl Fn(&ParamRecord) -> Vec<ParamRecord> + Send + Sync + 'static,
    ) -> Self {
        self.push(Step::ExpandWithParams {
            expander: Arc::new(expander),
        });
        self
    }

    /// Keep only records satisfying `pred`; survivors keep their order.
    pub fn filter(mut self, pred: impl Fn(&ParamRecord) -> bool + Send + Sync + 'static) -> Self {
        self.push(Step::Filter {
            pred: Arc::new(pred),
            keep_when: true,
        });
        self
    }

    /// Drop records satisfying `pred`.
    pub fn unless(mut self, pred: impl Fn(&ParamRecord) -> bool + Send + Sync + 'static) -> Self {
        self.push(Step::Filter {
            pred: Arc::new(pred),
            keep_when: false,
        });
        self
    }

    /// Mark the case/subcase boundary.
    ///
    /// # Panics
    /// Panics if called twice on the same builder.
    pub fn begin_subcases(mut self) -> Self {
        assert!(
            !self.in_subcases,
            "begin_subcases() may only be called once per pipeline"
        );
        self.in_subcases = true;
        self
    }

    /// Replay the pipeline, yielding one `CaseSpec` per case.
    ///
    /// Lazy and restartable: each call replays the steps from scratch and
    /// produces the same sequence. A duplicate key introduced by a merge
    /// surfaces as an `Err` item at the position where it occurs.
    pub fn iter_cases(&self) -> impl Iterator<Item = Result<CaseSpec, ParamsError>> + '_ {
        replay(&self.case_steps, ParamRecord::new()).map(move |case| {
            let case = case?;
            let subcases = self.subcases_of(&case)?;
            Ok(CaseSpec {
                params: case,
                subcases,
            })
        })
    }

    fn subcases_of(&self, case: &ParamRecord) -> Result<Vec<ParamRecord>, ParamsError> {
        if !self.in_subcases {
            return Ok(vec![]);
        }
        // Subcase steps see the case's fields; the stored subcase record
        // keeps only the fields added after the boundary.
        replay(&self.subcase_steps, case.clone())
            .map(|full| {
                let full = full?;
                Ok(full
                    .iter()
                    .filter(|(k, _)| !case.contains_key(k))
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect())
            })
            .collect()
    }
}

fn merge_field(
    base: &ParamRecord,
    name: &str,
    value: ParamValue,
) -> Result<ParamRecord, ParamsError> {
    if base.contains_key(name) {
        return Err(ParamsError::DuplicateKey {
            key: name.to_string(),
        });
    }
    let mut merged = base.clone();
    merged.insert(name.to_string(), value);
    Ok(merged)
}

fn merge_records(base: &ParamRecord, extra: &ParamRecord) -> Result<ParamRecord, ParamsError> {
    let mut merged = base.clone();
    for (key, value) in extra.iter() {
        if base.contains_key(key) {
            return Err(ParamsError::DuplicateKey {
                key: key.to_string(),
            });
        }
        merged.insert(key.to_string(), value.clone());
    }
    Ok(merged)
}

type RecordIter<'a> = Box<dyn Iterator<Item = Result<ParamRecord, ParamsError>> + 'a>;

/// Replay a step list lazily, starting from `seed`.
fn replay(steps: &[Step], seed: ParamRecord) -> RecordIter<'_> {
    let mut records: RecordIter<'_> = Box::new(std::iter::once(Ok(seed)));
    for step in steps {
        records = match step {
            Step::Combine { name, values } => Box::new(records.flat_map(move |record| {
                let out: RecordIter<'_> = match record {
                    Ok(record) => Box::new(
                        values
                            .iter()
                            .map(move |value| merge_field(&record, name, value.clone())),
                    ),
                    Err(e) => Box::new(std::iter::once(Err(e))),
                };
                out
            })),
            Step::Expand { name, expander } => Box::new(records.flat_map(move |record| {
                let out: RecordIter<'_> = match record {
                    Ok(record) => {
                        let values = expander(&record);
                        Box::new(
                            values
                                .into_iter()
                                .map(move |value| merge_field(&record, name, value)),
                        )
                    }
                    Err(e) => Box::new(std::iter::once(Err(e))),
                };
                out
            })),
            Step::ExpandWithParams { expander } => Box::new(records.flat_map(move |record| {
                let out: RecordIter<'_> = match record {
                    Ok(record) => {
                        let extras = expander(&record);
                        Box::new(
                            extras
                                .into_iter()
                                .map(move |extra| merge_records(&record, &extra)),
                        )
                    }
                    Err(e) => Box::new(std::iter::once(Err(e))),
                };
                out
            })),
            Step::Filter { pred, keep_when } => {
                Box::new(records.filter(move |record| match record {
                    Ok(record) => pred(record) == *keep_when,
                    Err(_) => true,
                }))
            }
        };
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_query::stringify_public_params;
    use pretty_assertions::assert_eq;

    fn case_names(builder: &ParamsBuilder) -> Vec<String> {
        builder
            .iter_cases()
            .map(|c| stringify_public_params(&c.unwrap().params))
            .collect()
    }

    #[test]
    fn cartesian_order() {
        let builder = params().combine("x", [1i64, 2]).combine("y", ["a", "b"]);
        assert_eq!(
            case_names(&builder),
            vec![
                "x=1;y=\"a\"",
                "x=1;y=\"b\"",
                "x=2;y=\"a\"",
                "x=2;y=\"b\"",
            ]
        );
    }

    #[test]
    fn empty_pipeline_yields_one_empty_record() {
        let builder = params();
        assert_eq!(case_names(&builder), vec![""]);
    }

    #[test]
    fn expand_reads_prior_fields() {
        let builder = params()
            .combine("addr_space", ["uniform", "storage"])
            .expand("access", |record| {
                match record.get("addr_space") {
                    Some(ParamValue::Str(s)) if s == "uniform" => vec!["read".into()],
                    _ => vec!["read".into(), "read_write".into()],
                }
            });
        assert_eq!(
            case_names(&builder),
            vec![
                "addr_space=\"uniform\";access=\"read\"",
                "addr_space=\"storage\";access=\"read\"",
                "addr_space=\"storage\";access=\"read_write\"",
            ]
        );
    }

    #[test]
    fn expand_with_params_adds_several_fields() {
        let builder = params().combine("n", [1i64]).expand_with_params(|_| {
            let mut a = ParamRecord::new();
            a.insert("w", 2);
            a.insert("h", 2);
            let mut b = ParamRecord::new();
            b.insert("w", 4);
            b.insert("h", 1);
            vec![a, b]
        });
        assert_eq!(case_names(&builder), vec!["n=1;w=2;h=2", "n=1;w=4;h=1"]);
    }

    #[test]
    fn filter_and_unless_preserve_order() {
        let builder = params()
            .combine("x", [1i64, 2, 3, 4])
            .filter(|r| !matches!(r.get("x"), Some(ParamValue::Int(3))))
            .unless(|r| matches!(r.get("x"), Some(ParamValue::Int(1))));
        assert_eq!(case_names(&builder), vec!["x=2", "x=4"]);
    }

    #[test]
    fn duplicate_key_is_an_error() {
        let builder = params().combine("x", [1i64]).combine("x", [2i64]);
        let results: Vec<_> = builder.iter_cases().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0],
            Err(ParamsError::DuplicateKey { key: "x".into() })
        );
    }

    #[test]
    fn restartable_iteration() {
        let builder = params().combine("x", [1i64, 2]).combine("y", [true, false]);
        let first = case_names(&builder);
        let second = case_names(&builder);
        assert_eq!(first, second);
    }

    #[test]
    fn subcases_share_a_case_name() {
        let builder = params()
            .combine("fmt", ["rgba", "bgra"])
            .begin_subcases()
            .combine("offset", [0i64, 8]);
        let cases: Vec<_> = builder
            .iter_cases()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(stringify_public_params(&cases[0].params), "fmt=\"rgba\"");
        assert_eq!(cases[0].subcases.len(), 2);
        assert_eq!(
            stringify_public_params(&cases[0].subcases[0]),
            "offset=0"
        );
        assert_eq!(
            stringify_public_params(&cases[0].subcases[1]),
            "offset=8"
        );
    }

    #[test]
    fn subcase_steps_can_read_case_fields() {
        let builder = params()
            .combine("n", [1i64, 2])
            .begin_subcases()
            .expand("m", |record| match record.get("n") {
                Some(ParamValue::Int(1)) => vec![ParamValue::Int(10)],
                _ => vec![ParamValue::Int(20), ParamValue::Int(30)],
            });
        let cases: Vec<_> = builder
            .iter_cases()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(cases[0].subcases.len(), 1);
        assert_eq!(cases[1].subcases.len(), 2);
    }

    #[test]
    #[should_panic(expected = "begin_subcases")]
    fn begin_subcases_twice_panics() {
        let _ = params().begin_subcases().begin_subcases();
    }
}
