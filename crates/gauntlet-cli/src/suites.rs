//! The built-in demo suite
//!
//! A small corpus exercising every registration feature: plain cases,
//! combinatorial and dependent parameterizations, subcases, skips, and a
//! TODO marker. The CLI and the integration tests both run against it.

use gauntlet_params::{booleans, params};
use gauntlet_query::ParamValue;
use gauntlet_tree::{CaseAbort, SpecFile, StaticSuiteLoader, TestGroup};

fn int(record: &gauntlet_query::ParamRecord, key: &str) -> i64 {
    match record.get(key) {
        Some(ParamValue::Int(value)) => *value,
        _ => 0,
    }
}

fn arith_spec() -> SpecFile {
    let mut group = TestGroup::new();

    group
        .test("add")
        .desc("wrapping addition is commutative")
        .params(params().combine("a", [0i64, 1, 7]).combine("b", [0i64, 3]))
        .run_fn(|ctx| async move {
            let a = int(&ctx.params, "a");
            let b = int(&ctx.params, "b");
            ctx.recorder.expect(
                a.wrapping_add(b) == b.wrapping_add(a),
                "addition must commute",
            );
            Ok(())
        });

    group
        .test("div")
        .desc("division truncates toward zero")
        .params(
            params()
                .combine("num", [7i64, -7])
                .expand("den", |record| {
                    // Negative numerators also exercise a negative divisor.
                    if int(record, "num") < 0 {
                        vec![ParamValue::Int(2), ParamValue::Int(-2)]
                    } else {
                        vec![ParamValue::Int(2)]
                    }
                }),
        )
        .run_fn(|ctx| async move {
            let num = int(&ctx.params, "num");
            let den = int(&ctx.params, "den");
            let q = num / den;
            ctx.recorder
                .expect(q.checked_mul(den).is_some(), "no overflow");
            ctx.recorder
                .expect((q * den).abs() <= num.abs(), "truncation toward zero");
            Ok(())
        });

    group
        .test("overflow_diagnostics")
        .desc("report the exact wrap-around values")
        .todo()
        .run_fn(|_ctx| async { Ok(()) });

    SpecFile {
        description: "integer arithmetic conformance".into(),
        group,
    }
}

fn text_spec() -> SpecFile {
    let mut group = TestGroup::new();

    group
        .test("repeat")
        .desc("repeat count and byte length agree, per alignment")
        .params(
            params()
                .combine("count", [0i64, 1, 4])
                .begin_subcases()
                .combine("trailing", [false, true]),
        )
        .run_fn(|ctx| async move {
            let count = int(&ctx.params, "count") as usize;
            let piece = "ab";
            let repeated = piece.repeat(count);
            ctx.recorder.expect(
                repeated.len() == piece.len() * count,
                "length must scale with count",
            );
            if matches!(ctx.params.get("trailing"), Some(ParamValue::Bool(true))) {
                ctx.recorder
                    .expect(!repeated.ends_with(' '), "no trailing spaces");
            }
            Ok(())
        });

    group
        .test("empty_input")
        .desc("operations on empty input are no-ops")
        .params(booleans("strict"))
        .run_fn(|ctx| async move {
            if ctx.params.get("strict") == Some(&ParamValue::Bool(false)) {
                return Err(CaseAbort::Skip("lenient mode is not checked".into()));
            }
            ctx.recorder.expect("".repeat(3).is_empty(), "empty stays empty");
            Ok(())
        });

    SpecFile {
        description: "text operation conformance".into(),
        group,
    }
}

/// Build the demo suite loader.
pub fn demo_loader() -> StaticSuiteLoader {
    let mut loader = StaticSuiteLoader::new();
    loader.add_readme("demo", &[], "Demonstration conformance corpus.");
    loader.add_file("demo", &["arith"], arith_spec);
    loader.add_file("demo", &["text"], text_spec);
    loader
}
