//! Performance benchmarks for Portico.
//!
//! This module contains benchmarks for:
//! - Path translation throughput
//! - Script shim pattern matching
//! - Package compatibility analysis
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

use portico::compat;
use portico::shim::{paths, script};

// ============================================================================
// Fixtures
// ============================================================================

mod fixtures {
    use std::path::Path;

    /// Lay out a package with `num_files` source files, some of which
    /// carry macOS markers.
    pub fn populate_package(dir: &Path, num_files: usize) {
        std::fs::write(
            dir.join("package.json"),
            r#"{"name":"bench","commands":[{"name":"main","title":"Main"}]}"#,
        )
        .unwrap();
        for i in 0..num_files {
            let body = if i % 7 == 0 {
                format!("const p{i} = \"/Applications/App.app\";\nrunAppleScript('beep');")
            } else {
                format!("export const value{i} = {i};")
            };
            std::fs::write(dir.join(format!("module{i}.js")), body).unwrap();
        }
    }

    pub const SCRIPTS: &[&str] = &[
        r#"do shell script "echo hello""#,
        r#"open location "https://example.com""#,
        r#"tell application "Firefox" to activate"#,
        r#"display notification "done" with title "Build""#,
        "set volume output volume 40",
        r#"set the clipboard to "copied""#,
        r#"tell application "System Events" to keystroke "v" using {command down}"#,
        "some totally unsupported script body",
    ];
}

// ============================================================================
// Path Translation
// ============================================================================

fn bench_translate_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate_path");

    for (label, path) in [
        ("applications", "/Applications/Foo.app/Contents/MacOS/Foo"),
        ("user_library", "~/Library/Application Support/MyApp/state.json"),
        ("passthrough", "/opt/tooling/bin/something"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(label), path, |b, path| {
            b.iter(|| paths::translate(black_box(path)));
        });
    }
    group.finish();
}

// ============================================================================
// Script Shim Matching
// ============================================================================

fn bench_script_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("script_parse");
    group.throughput(Throughput::Elements(fixtures::SCRIPTS.len() as u64));

    group.bench_function("pattern_table", |b| {
        b.iter(|| {
            for s in fixtures::SCRIPTS {
                black_box(script::parse(black_box(s)));
            }
        });
    });
    group.finish();
}

// ============================================================================
// Compatibility Analysis
// ============================================================================

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("compat_analyze");
    group.sample_size(20);

    for size in [10usize, 100] {
        let dir = TempDir::new().unwrap();
        fixtures::populate_package(dir.path(), size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &dir, |b, dir| {
            b.iter(|| compat::analyze(black_box(dir.path())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_translate_path, bench_script_parse, bench_analyze);
criterion_main!(benches);
