//! Criterion benchmarks for the mining pipeline.
//!
//! Run with: `cargo bench`
//!
//! Synthetic inputs only, so numbers are comparable across machines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{Duration, TimeZone, Utc};
use revmine::revlog::copyfrom::infer_copy_from;
use revmine::source::memory::{CommitScript, MemorySource, RepoScript};
use revmine::{parse_diff_counts, ChangeEntry, ChangeKind, CopyFrom, MineConfig, Miner};
use revmine::revlog::CopyOrigin;

// ─── Helpers ─────────────────────────────────────────────────────────

/// Whole-revision style diff touching `files` files, `hunks` hunks each.
fn synthetic_diff(files: usize, hunks: usize) -> Vec<u8> {
    let mut out = String::new();
    for f in 0..files {
        let name = format!("trunk/src/module_{}/file_{}.c", f % 20, f);
        out.push_str(&format!("Index: {}\n", name));
        out.push_str("===================================================================\n");
        out.push_str(&format!("--- {}\t(revision 99)\n+++ {}\t(revision 100)\n", name, name));
        for h in 0..hunks {
            let line = h * 40 + 1;
            out.push_str(&format!("@@ -{},7 +{},8 @@\n", line, line));
            out.push_str(" context\n context\n-removed line\n+added line\n+another added line\n context\n context\n context\n");
        }
    }
    out.into_bytes()
}

/// A branch copy plus `modified` edits below it and as many unrelated edits.
fn synthetic_branch_entries(modified: usize) -> Vec<ChangeEntry> {
    let mut entries = vec![ChangeEntry::new("/branches/release", ChangeKind::Added).with_copy_from(CopyFrom {
        path: "/trunk".to_string(),
        revision: 500,
        origin: CopyOrigin::Explicit,
    })];
    for i in 0..modified {
        entries.push(ChangeEntry::new(&format!("/branches/release/src/file_{}.c", i), ChangeKind::Modified));
        entries.push(ChangeEntry::new(&format!("/trunk/other/file_{}.c", i), ChangeKind::Modified));
    }
    entries
}

/// `commits` revisions, each editing a few files under /trunk.
fn synthetic_repository(commits: usize) -> MemorySource {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut script = RepoScript::new("svn://bench.example/repo").commit(
        CommitScript::new()
            .author("bench")
            .date(base)
            .mkdir("/trunk")
            .put("/trunk/a.c", "a\n")
            .put("/trunk/b.c", "b\n")
            .put("/trunk/c.c", "c\n"),
    );
    for i in 1..commits {
        let body: String = (0..(i % 30 + 1)).map(|n| format!("line {} of {}\n", n, i)).collect();
        let target = ["/trunk/a.c", "/trunk/b.c", "/trunk/c.c"][i % 3];
        script = script.commit(
            CommitScript::new()
                .author("bench")
                .date(base + Duration::minutes(i as i64))
                .put(target, &body)
                .put(&format!("/trunk/new_{}.c", i), &body),
        );
    }
    MemorySource::from_script(&script).unwrap()
}

// ─── Diff Parsing ────────────────────────────────────────────────────

fn bench_diff_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_parsing");
    for &(files, hunks) in &[(1, 5), (50, 5), (500, 2)] {
        let diff = synthetic_diff(files, hunks);
        group.bench_with_input(
            BenchmarkId::new("files", format!("{}x{}", files, hunks)),
            &diff,
            |b, diff| b.iter(|| parse_diff_counts(black_box(diff))),
        );
    }
    group.finish();
}

// ─── Copy-From Inference ─────────────────────────────────────────────

fn bench_copy_from_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("copy_from_inference");
    for &modified in &[10, 100, 1_000] {
        let entries = synthetic_branch_entries(modified);
        group.bench_with_input(BenchmarkId::new("entries", modified * 2 + 1), &entries, |b, entries| {
            b.iter(|| infer_copy_from(black_box(entries.clone())))
        });
    }
    group.finish();
}

// ─── Pipeline ────────────────────────────────────────────────────────

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    for &commits in &[50, 200] {
        let source = synthetic_repository(commits);
        group.bench_with_input(BenchmarkId::new("memory_source", commits), &source, |b, source| {
            b.iter(|| {
                let miner = Miner::new(source, MineConfig::default()).unwrap();
                let range = miner.plan(0, None, None).unwrap().unwrap();
                miner.revisions(range).map(|r| r.unwrap().total_counts().added).sum::<u32>()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_diff_parsing, bench_copy_from_inference, bench_pipeline);
criterion_main!(benches);
