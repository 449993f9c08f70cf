use criterion::{criterion_group, criterion_main, Criterion};
use fsmc::{compile::compile_str, lexer::LexerConfig};
use std::hint::black_box;

criterion_main!(benches);
criterion_group!(benches, bench_fixtures, bench_wide);

const FIXTURES: &[(&str, &str)] = &[
    ("door", include_str!("../tests/door.fsm")),
    ("player", include_str!("../tests/player.fsm")),
    ("turnstile", include_str!("../tests/turnstile.fsm")),
];

fn bench_fixtures(c: &mut Criterion) {
    for (name, source) in FIXTURES {
        bench_compile(c, name, source);
    }
}

// A ring of states, each with a direct step and a sequence of two steps.
fn bench_wide(c: &mut Criterion) {
    let mut source = String::from("fsm Ring {\n    class Ctx as ctx;\n");
    let n = 200;
    for i in 0..n {
        source.push_str(&format!(
            "    S{i} {{\n        next() => S{next};\n        skip() => next(), next();\n    }}\n",
            i = i,
            next = (i + 1) % n,
        ));
    }
    source.push_str("}\n");
    bench_compile(c, "ring200", &source);

    c.bench_function("ring200/analyze", |b| {
        let config = LexerConfig::default();
        b.iter(|| {
            let _fsm = black_box(fsmc::compile::analyze(&source, &config).unwrap());
        });
    });
}

fn bench_compile(c: &mut Criterion, name: &str, source: &str) {
    c.bench_function(name, |b| {
        b.iter(|| {
            let _artifacts = black_box(compile_str(source, "/bench/input.fsm", name).unwrap());
        });
    });
}
