use criterion::{criterion_group, criterion_main, Criterion};
use prism_core::{merge, split};
use std::hint::black_box;

/// A generated document of roughly the size the generator produces.
fn generated_document(script_lines: usize) -> String {
    let mut script = String::new();
    for i in 0..script_lines {
        script.push_str(&format!("      const item{i} = useState({i});\n"));
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n    <script src=\"https://cdn.tailwindcss.com\"></script>\n    <style>\n      body {{ margin: 0; }}\n    </style>\n</head>\n<body>\n    <div id=\"root\"></div>\n    <script type=\"text/babel\">\n{script}    </script>\n</body>\n</html>"
    )
}

fn bench_split(c: &mut Criterion) {
    let doc = generated_document(500);
    c.bench_function("split_500_lines", |b| {
        b.iter(|| black_box(split(black_box(&doc))))
    });
}

fn bench_merge_region(c: &mut Criterion) {
    let doc = generated_document(500);
    c.bench_function("merge_style_500_lines", |b| {
        b.iter(|| black_box(merge(black_box(&doc), "styles.css", "body { margin: 4px; }")))
    });
}

fn bench_split_merge_cycle(c: &mut Criterion) {
    let doc = generated_document(500);
    c.bench_function("split_then_merge_script", |b| {
        b.iter(|| {
            let files = split(&doc);
            black_box(merge(&doc, &files[2].name, &files[2].content))
        })
    });
}

criterion_group!(benches, bench_split, bench_merge_region, bench_split_merge_cycle);
criterion_main!(benches);
