use cmdsearch::{search, ContentMatcher, Filter, PatternSyntax, SearchCriteria};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs::{self, File};
use std::io::Write;
use std::sync::atomic::AtomicBool;
use tempfile::tempdir;

fn create_test_tree(dir: &tempfile::TempDir, dirs: usize, files_per_dir: usize) -> std::io::Result<()> {
    for d in 0..dirs {
        let sub = dir.path().join(format!("dir_{}", d));
        fs::create_dir_all(&sub)?;
        for i in 0..files_per_dir {
            let ext = if i % 3 == 0 { "rs" } else { "txt" };
            let mut file = File::create(sub.join(format!("file_{}.{}", i, ext)))?;
            for j in 0..20 {
                writeln!(file, "Line {} in file {}: nothing interesting here", j, i)?;
            }
            if i % 5 == 0 {
                writeln!(file, "TODO: fix bug {}", i)?;
            }
        }
    }
    Ok(())
}

fn bench_name_filter(c: &mut Criterion) {
    let names: Vec<String> = (0..1000).map(|i| format!("document_{}.txt", i)).collect();
    let glob = Filter::new("*_9*.txt", false, PatternSyntax::Glob).unwrap();
    let regex = Filter::new(r"_9\d*\.txt$", false, PatternSyntax::Regex).unwrap();

    let mut group = c.benchmark_group("Name Filter");
    group.bench_function("glob", |b| {
        b.iter(|| names.iter().filter(|n| glob.matches(black_box(n))).count())
    });
    group.bench_function("regex", |b| {
        b.iter(|| names.iter().filter(|n| regex.matches(black_box(n))).count())
    });
    group.finish();
}

fn bench_content_scan(c: &mut Criterion) {
    let stop = AtomicBool::new(false);
    let matcher = ContentMatcher::new("needle", false).unwrap();

    let mut group = c.benchmark_group("Content Scan");
    for size in [4 * 1024, 64 * 1024, 1024 * 1024] {
        let mut data = vec![b'x'; size];
        data.extend_from_slice(b"needle");
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| matcher.matches_reader(black_box(data.as_slice()), &stop).unwrap())
        });
    }
    group.finish();
}

fn bench_tree_search(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_test_tree(&dir, 20, 50).unwrap();

    let name_only = SearchCriteria::new("*.rs");
    let with_content = SearchCriteria::new("*.txt").with_content("TODO");

    let mut group = c.benchmark_group("Tree Search");
    group.bench_function("name_only", |b| {
        b.iter(|| black_box(search(dir.path(), &name_only).unwrap()))
    });
    group.bench_function("with_content", |b| {
        b.iter(|| black_box(search(dir.path(), &with_content).unwrap()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_name_filter,
    bench_content_scan,
    bench_tree_search
);
criterion_main!(benches);
