use carlae::{Environment, evaluate, evaluate_top_level, parse_str, tokenize};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const DEFINITIONS: [&str; 2] = [
    "(def (fib n) (if n (if (- n 1) (+ (fib (- n 1)) (fib (- n 2))) 1) 0))",
    "(def (fact n) (if n (* n (fact (- n 1))) 1))",
];

// One expression per line, the way the runner feeds them in
const BENCH_LINES: &str = r#"
# Calculate the nth Fibonacci number
(def (fib n) (if n (if (- n 1) (+ (fib (- n 1)) (fib (- n 2))) 1) 0))
(def (fact n) (if n (* n (fact (- n 1))) 1))
(def compose (fun (f g) (fun (x) (f (g x)))))
(def add1 (fun (x) (+ x 1)))
((compose add1 fact) 10)
(fib 10)
(fact 5)
(+ 1 2.5 -3 (* 4 (/ 10 4)))
"#;

fn bench_front_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("Front end");
    group.bench_with_input(
        BenchmarkId::new("tokenize", "program"),
        &BENCH_LINES,
        |b, input| b.iter(|| tokenize(black_box(input))),
    );
    group.bench_with_input(
        BenchmarkId::new("parse", "definition"),
        &DEFINITIONS[0],
        |b, input| b.iter(|| parse_str(black_box(input))),
    );
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let env = Environment::new_global();
    for line in DEFINITIONS {
        if let Err(e) = evaluate_top_level(line, Some(env.clone())) {
            panic!("Benchmark definition failed: {}", e);
        }
    }

    let mut group = c.benchmark_group("Evaluate");
    for n in [10, 15] {
        let call = match parse_str(&format!("(fib {})", n)) {
            Ok(node) => node,
            Err(e) => panic!("Benchmark call failed to parse: {}", e),
        };
        group.bench_with_input(BenchmarkId::new("fib", n), &call, |b, call| {
            b.iter(|| evaluate(black_box(call), &env))
        });
    }
    group.bench_function("session", |b| {
        b.iter(|| {
            let session = Environment::new_global();
            for line in BENCH_LINES.lines().filter(|l| !carlae::lexer::is_blank(l)) {
                let _ = evaluate_top_level(black_box(line), Some(session.clone()));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_front_end, bench_evaluate);
criterion_main!(benches);
