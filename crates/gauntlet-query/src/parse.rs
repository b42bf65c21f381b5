//! Strict parser for query text
//!
//! The grammar is small but every malformation is rejected here, at the
//! boundary, so the rest of the engine can key maps on printed queries
//! without re-validating.

use crate::params::{parse_param_value, param_key_is_public, valid_query_part, ParamRecord};
use crate::query::TestQuery;
use crate::separators::{BIG_SEPARATOR, PARAM_SEPARATOR, PATH_SEPARATOR, WILDCARD};
use crate::QueryError;

/// Parse query text into a `TestQuery`.
///
/// Percent-encoded sequences are decoded first; queries arrive URL-encoded
/// from the HTTP RPC surface.
pub fn parse_query(text: &str) -> Result<TestQuery, QueryError> {
    let decoded = urlencoding::decode(text)
        .map_err(|_| QueryError::InvalidEncoding(text.to_string()))?;
    parse_decoded(&decoded)
}

fn parse_decoded(text: &str) -> Result<TestQuery, QueryError> {
    // The params level may contain `:` inside string values, so the split
    // is bounded at four parts.
    let big: Vec<&str> = text.splitn(4, BIG_SEPARATOR).collect();
    if big.len() < 2 {
        return Err(QueryError::MissingSuite(text.to_string()));
    }
    let suite = big[0].to_string();
    if !valid_query_part(&suite) {
        return Err(QueryError::MissingSuite(text.to_string()));
    }

    let (file_path, file_wildcard) = parse_big_part(big[1], PATH_SEPARATOR, text)?;

    if big.len() == 2 {
        if !file_wildcard {
            return Err(QueryError::MissingFileWildcard(text.to_string()));
        }
        return Ok(TestQuery::MultiFile { suite, file_path });
    }
    if file_wildcard {
        return Err(QueryError::MisplacedWildcard(text.to_string()));
    }
    if file_path.is_empty() {
        return Err(QueryError::EmptyFilePath(text.to_string()));
    }

    let (test_path, test_wildcard) = parse_big_part(big[2], PATH_SEPARATOR, text)?;

    if big.len() == 3 {
        if !test_wildcard {
            return Err(QueryError::MissingTestWildcard(text.to_string()));
        }
        return Ok(TestQuery::MultiTest {
            suite,
            file_path,
            test_path,
        });
    }
    if test_wildcard {
        return Err(QueryError::MisplacedWildcard(text.to_string()));
    }
    if test_path.is_empty() {
        return Err(QueryError::EmptyTestPath(text.to_string()));
    }

    let (param_parts, params_wildcard) = parse_big_part(big[3], PARAM_SEPARATOR, text)?;

    let mut params = ParamRecord::new();
    for part in &param_parts {
        let (key, value) = parse_single_param(part)?;
        if params.insert(key.clone(), value).is_some() {
            return Err(QueryError::DuplicateParamKey { key });
        }
    }

    if params_wildcard {
        Ok(TestQuery::MultiCase {
            suite,
            file_path,
            test_path,
            params,
        })
    } else {
        Ok(TestQuery::Single {
            suite,
            file_path,
            test_path,
            params,
        })
    }
}

/// Split one level on its small separator and strip a terminal wildcard.
///
/// A `*` anywhere other than as the complete final segment is an error.
fn parse_big_part(
    part: &str,
    separator: char,
    whole: &str,
) -> Result<(Vec<String>, bool), QueryError> {
    if part.is_empty() {
        return Ok((vec![], false));
    }
    let mut segments: Vec<String> = part.split(separator).map(str::to_string).collect();
    let ends_with_wildcard = segments.last().map(String::as_str) == Some(WILDCARD);
    for (i, segment) in segments.iter().enumerate() {
        let is_terminal_wildcard = ends_with_wildcard && i == segments.len() - 1;
        if segment.contains(WILDCARD) && !is_terminal_wildcard {
            return Err(QueryError::MisplacedWildcard(whole.to_string()));
        }
    }
    if ends_with_wildcard {
        segments.pop();
    }
    Ok((segments, ends_with_wildcard))
}

fn parse_single_param(part: &str) -> Result<(String, crate::ParamValue), QueryError> {
    if part.is_empty() {
        return Err(QueryError::BlankParam(part.to_string()));
    }
    let Some(eq) = part.find('=') else {
        return Err(QueryError::MalformedParam {
            param: part.to_string(),
        });
    };
    let key = &part[..eq];
    let value_text = &part[eq + 1..];
    if !valid_query_part(key) || !param_key_is_public(key) {
        return Err(QueryError::InvalidParamKey {
            key: key.to_string(),
        });
    }
    let value = parse_param_value(value_text)?;
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParamValue, QueryLevel};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn roundtrip(text: &str) {
        let query = parse_query(text).unwrap();
        assert_eq!(query.to_string(), text);
        assert_eq!(parse_query(&query.to_string()).unwrap(), query);
    }

    #[test]
    fn parses_all_levels() {
        roundtrip("demo:*");
        roundtrip("demo:a,*");
        roundtrip("demo:a,b,*");
        roundtrip("demo:a,b:*");
        roundtrip("demo:a,b:t,*");
        roundtrip("demo:a,b:t,u,*");
        roundtrip("demo:a,b:t,u:*");
        roundtrip("demo:a,b:t,u:x=1;*");
        roundtrip("demo:a,b:t,u:x=1;y=\"s\";*");
        roundtrip("demo:a,b:t,u:x=1");
        roundtrip("demo:a,b:t,u:");
        roundtrip("demo:a:t:x=undefined");
        roundtrip("demo:a:t:xs=[1,2]");
    }

    #[test]
    fn levels_are_correct() {
        assert_eq!(parse_query("demo:*").unwrap().level(), QueryLevel::MultiFile);
        assert_eq!(
            parse_query("demo:a:*").unwrap().level(),
            QueryLevel::MultiTest
        );
        assert_eq!(
            parse_query("demo:a:t:*").unwrap().level(),
            QueryLevel::MultiCase
        );
        assert_eq!(
            parse_query("demo:a:t:").unwrap().level(),
            QueryLevel::Single
        );
    }

    #[test]
    fn param_values_parse() {
        let query = parse_query("demo:a:t:x=1;y=true;z=\"s\"").unwrap();
        let params = query.params().unwrap();
        assert_eq!(params.get("x"), Some(&ParamValue::Int(1)));
        assert_eq!(params.get("y"), Some(&ParamValue::Bool(true)));
        assert_eq!(params.get("z"), Some(&ParamValue::Str("s".into())));
    }

    #[test]
    fn percent_encoded_input_is_decoded() {
        let query = parse_query("demo:a:t:z=%22s%22").unwrap();
        assert_eq!(query.to_string(), "demo:a:t:z=\"s\"");
    }

    #[rstest]
    #[case::no_separator("demo")]
    #[case::empty("")]
    #[case::file_without_wildcard("demo:a,b")]
    #[case::test_without_wildcard("demo:a:t")]
    #[case::mid_segment_wildcard("demo:a*,b,*")]
    #[case::wildcard_then_more("demo:*,b,*")]
    #[case::empty_file_part("demo::*")]
    #[case::empty_test_part("demo:a::x=1")]
    #[case::blank_param("demo:a:t:;*")]
    #[case::param_missing_equals("demo:a:t:x")]
    #[case::private_param("demo:a:t:_x=1")]
    #[case::bad_param_key("demo:a:t:x!=1")]
    #[case::bad_param_value("demo:a:t:x=nope")]
    #[case::duplicate_param_key("demo:a:t:x=1;x=2")]
    fn rejects_malformed(#[case] text: &str) {
        assert!(parse_query(text).is_err(), "should reject: {text}");
    }

    proptest! {
        #[test]
        fn roundtrip_generated_queries(
            suite in "[a-z][a-z0-9_]{0,6}",
            file in proptest::collection::vec("[a-z][a-z0-9_]{0,6}", 1..3),
            test in proptest::collection::vec("[a-z][a-z0-9_]{0,6}", 1..3),
            ints in proptest::collection::vec(-100i64..100, 0..3),
            wild in proptest::bool::ANY,
        ) {
            let mut params = crate::ParamRecord::new();
            for (i, v) in ints.iter().enumerate() {
                params.insert(format!("p{i}"), *v);
            }
            let query = if wild {
                TestQuery::MultiCase {
                    suite, file_path: file, test_path: test, params,
                }
            } else {
                TestQuery::Single {
                    suite, file_path: file, test_path: test, params,
                }
            };
            let text = query.to_string();
            prop_assert_eq!(parse_query(&text).unwrap(), query);
        }
    }
}
