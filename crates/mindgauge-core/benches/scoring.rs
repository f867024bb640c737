use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mindgauge_core::catalog;
use mindgauge_core::model::{
    Question, Response, ScoringRules, ScoringType, TestTemplate,
};
use mindgauge_core::risk::assess;
use mindgauge_core::scoring::score;

fn dimensional_template(items: u32) -> TestTemplate {
    let dims = ["D", "I", "S", "C"];
    let questions = (1..=items)
        .map(|i| {
            let mut q = Question::likert(i, i, 1.0, 5.0);
            q.dimension_pair = Some(dims[(i % 4) as usize].to_string());
            q.reverse_scored = i % 7 == 0;
            q
        })
        .collect();
    TestTemplate {
        key: "bench-disc".into(),
        name: String::new(),
        description: String::new(),
        version: None,
        questions,
        scoring_rules: ScoringRules {
            scoring_type: ScoringType::Categorical,
            dimensions: dims.iter().map(|d| d.to_string()).collect(),
            ..ScoringRules::default()
        },
        interpretation_guide: Default::default(),
    }
}

fn answers(count: u32, max: u32) -> Vec<Response> {
    (1..=count)
        .map(|i| Response::answered(i, (i * 7) % (max + 1)))
        .collect()
}

fn bench_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");

    let who5 = catalog::who5();
    let who5_answers = answers(5, 5);
    group.bench_function("who5_simple_sum", |b| {
        b.iter(|| score(black_box(&who5), black_box(&who5_answers)))
    });

    let disc = dimensional_template(48);
    let disc_answers: Vec<Response> = (1..=48)
        .map(|i| Response::answered(i, 1 + (i * 3) % 5))
        .collect();
    group.bench_function("categorical_48", |b| {
        b.iter(|| score(black_box(&disc), black_box(&disc_answers)))
    });

    group.finish();
}

fn bench_risk(c: &mut Criterion) {
    let gad7 = catalog::gad7();
    let responses = answers(7, 3);
    c.bench_function("risk_gad7", |b| {
        b.iter(|| {
            assess(
                black_box(&gad7.interpretation_guide.risk_indicators),
                black_box(&responses),
            )
        })
    });
}

criterion_group!(benches, bench_score, bench_risk);
criterion_main!(benches);
