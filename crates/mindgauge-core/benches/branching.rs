use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mindgauge_core::branching::{resolve, visible_questions};
use mindgauge_core::model::{Question, Response, TestTemplate};
use mindgauge_core::rules::validate_template;

/// A template where every third question depends on the one before it.
fn branching_template(items: u32) -> TestTemplate {
    let questions = (1..=items)
        .map(|i| {
            let mut q = Question::likert(i, i, 0.0, 5.0);
            if i % 3 == 0 {
                q.show_if_question_id = Some(i - 1);
                q.show_if_value = Some(3.0);
            }
            q
        })
        .collect();
    TestTemplate {
        key: "bench-branching".into(),
        name: String::new(),
        description: String::new(),
        version: None,
        questions,
        scoring_rules: Default::default(),
        interpretation_guide: Default::default(),
    }
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("visibility");
    let empty: Vec<Response> = Vec::new();

    for items in [12u32, 60] {
        let template = branching_template(items);
        let responses: Vec<Response> = (1..=items)
            .map(|i| Response::answered(i, i % 6))
            .collect();

        group.bench_function(format!("resolve_{items}"), |b| {
            b.iter(|| resolve(black_box(&template), black_box(&responses)))
        });
        group.bench_function(format!("visible_{items}_empty"), |b| {
            b.iter(|| visible_questions(black_box(&template), black_box(&empty)))
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let template = branching_template(60);
    c.bench_function("validate_60", |b| {
        b.iter(|| validate_template(black_box(&template)))
    });
}

criterion_group!(benches, bench_resolve, bench_validate);
criterion_main!(benches);
