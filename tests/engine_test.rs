//! End-to-end engine tests over real temp workspaces.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use codeloom::config::IndexConfig;
use codeloom::indexing::progress::{BatchOptions, ProgressCallback};
use codeloom::indexing::{IndexEngine, SearchOptions};
use codeloom::parsing::{ParserRegistry, RegisterOptions, TypeScriptParser};
use codeloom::types::SymbolKind;
use tempfile::TempDir;

fn engine_for(root: &Path) -> IndexEngine {
    let registry = Arc::new(ParserRegistry::new());
    registry
        .register(
            Arc::new(TypeScriptParser::new().unwrap()),
            RegisterOptions::default(),
        )
        .unwrap();
    registry.initialize().unwrap();
    IndexEngine::with_registry(IndexConfig::new(root), registry).unwrap()
}

#[tokio::test]
async fn fresh_index_with_two_files() {
    let ws = TempDir::new().unwrap();
    fs::write(ws.path().join("a.ts"), "export function foo(){}").unwrap();
    fs::write(ws.path().join("b.ts"), "export class Bar{}").unwrap();

    let engine = engine_for(ws.path());
    let outcome = engine.index_project(None).await.unwrap();
    assert_eq!(outcome.indexed, 2);
    assert!(outcome.errors.is_empty());

    let foo = engine.find_symbol("foo", None).unwrap();
    assert_eq!(foo.len(), 1);
    assert_eq!(foo[0].symbol.kind, SymbolKind::Function);
    assert_eq!(foo[0].score, 1.0);
    assert!(
        foo[0]
            .file_info
            .as_ref()
            .unwrap()
            .file_path
            .ends_with("a.ts")
    );

    let bar = engine.find_symbol("Bar", None).unwrap();
    assert_eq!(bar.len(), 1);
    assert_eq!(bar[0].symbol.kind, SymbolKind::Class);
    assert!(
        bar[0]
            .file_info
            .as_ref()
            .unwrap()
            .file_path
            .ends_with("b.ts")
    );

    let stats = engine.get_stats().unwrap();
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.indexed_files, 2);
    assert_eq!(stats.total_symbols, 2);
    assert!(stats.index_size > 0);
}

#[tokio::test]
async fn orphan_cleanup_on_reindex() {
    let ws = TempDir::new().unwrap();
    let a = ws.path().join("a.ts");
    let b = ws.path().join("b.ts");
    fs::write(&a, "export function foo(){}").unwrap();
    fs::write(&b, "export class Bar{}").unwrap();

    let engine = engine_for(ws.path());
    engine.index_project(None).await.unwrap();
    assert_eq!(engine.get_stats().unwrap().total_files, 2);

    fs::remove_file(&b).unwrap();
    engine.index_project(None).await.unwrap();

    assert!(engine.find_symbol("Bar", None).unwrap().is_empty());
    assert!(!engine.is_indexed(&b).unwrap());
    assert_eq!(engine.get_stats().unwrap().total_files, 1);

    // No orphaned entries in any symbol view.
    assert!(engine.symbol_index().file_symbols(&b).is_empty());
    assert_eq!(engine.symbol_index().total_symbols(), 1);
}

#[tokio::test]
async fn parse_error_isolation() {
    let ws = TempDir::new().unwrap();
    let good = ws.path().join("good.ts");
    let bad = ws.path().join("bad.ts");
    fs::write(&good, "export function ok(){}").unwrap();
    fs::write(&bad, "export function broken(").unwrap();

    let engine = engine_for(ws.path());
    let outcome = engine.index_project(None).await.unwrap();

    // The batch completes despite the failure.
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].path.ends_with("bad.ts"));

    assert!(engine.is_indexed(&good).unwrap());
    assert!(!engine.is_indexed(&bad).unwrap());
    assert!(engine.file_index().has_file_parse_errors(&bad));
    assert_eq!(engine.find_symbol("ok", None).unwrap().len(), 1);
    assert!(engine.find_symbol("broken", None).unwrap().is_empty());
}

#[tokio::test]
async fn empty_workspace_yields_zero_stats() {
    let ws = TempDir::new().unwrap();
    let engine = engine_for(ws.path());

    let outcome = engine.index_project(None).await.unwrap();
    assert_eq!(outcome.processed, 0);

    let stats = engine.get_stats().unwrap();
    assert_eq!(stats.total_files, 0);
    assert_eq!(stats.total_symbols, 0);
}

#[tokio::test]
async fn reindexing_unchanged_workspace_is_stable() {
    let ws = TempDir::new().unwrap();
    fs::write(
        ws.path().join("a.ts"),
        "import { b } from \"./b\";\nexport function foo(){}\nexport class Widget{}\n",
    )
    .unwrap();
    fs::write(ws.path().join("b.ts"), "export const b = 1;").unwrap();

    let engine = engine_for(ws.path());
    engine.index_project(None).await.unwrap();
    let first = engine.get_stats().unwrap();

    engine.index_project(None).await.unwrap();
    let second = engine.get_stats().unwrap();

    assert_eq!(first.total_files, second.total_files);
    assert_eq!(first.total_symbols, second.total_symbols);
    assert_eq!(first.total_dependencies, second.total_dependencies);
}

#[tokio::test]
async fn excluded_directories_are_not_indexed() {
    let ws = TempDir::new().unwrap();
    fs::create_dir_all(ws.path().join("node_modules/pkg")).unwrap();
    fs::create_dir_all(ws.path().join("src")).unwrap();
    fs::write(
        ws.path().join("node_modules/pkg/index.ts"),
        "export const dep = 1;",
    )
    .unwrap();
    fs::write(ws.path().join("src/app.ts"), "export const app = 1;").unwrap();

    let engine = engine_for(ws.path());
    engine.index_project(None).await.unwrap();

    assert_eq!(engine.get_stats().unwrap().total_files, 1);
    assert!(engine.find_symbol("dep", None).unwrap().is_empty());
    assert_eq!(engine.find_symbol("app", None).unwrap().len(), 1);
}

#[tokio::test]
async fn search_respects_max_results_boundaries() {
    let ws = TempDir::new().unwrap();
    fs::write(
        ws.path().join("cal.ts"),
        "export class Calculator{}\nexport class Calendar{}\nexport const Cal = 1;\n",
    )
    .unwrap();

    let engine = engine_for(ws.path());
    engine.index_project(None).await.unwrap();

    let all = engine
        .search_symbols("Cal", &SearchOptions::default())
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].symbol.name, "Cal");
    for window in all.windows(2) {
        assert!(window[0].score >= window[1].score);
    }

    let none = engine
        .search_symbols(
            "Cal",
            &SearchOptions {
                max_results: 0,
                ..SearchOptions::default()
            },
        )
        .unwrap();
    assert!(none.is_empty());

    let clipped = engine
        .search_symbols(
            "Cal",
            &SearchOptions {
                max_results: 2,
                ..SearchOptions::default()
            },
        )
        .unwrap();
    assert_eq!(clipped.len(), 2);
}

#[tokio::test]
async fn dependencies_are_recorded_per_file() {
    let ws = TempDir::new().unwrap();
    fs::write(
        ws.path().join("main.ts"),
        "import { helper } from \"./util\";\nimport fs from \"fs\";\nexport function main(){ helper(); }\n",
    )
    .unwrap();
    fs::write(ws.path().join("util.ts"), "export function helper(){}").unwrap();

    let engine = engine_for(ws.path());
    engine.index_project(None).await.unwrap();

    let deps = engine
        .file_index()
        .get_file_dependencies(&ws.path().join("main.ts"))
        .unwrap();
    assert_eq!(deps.len(), 2);
    assert!(deps.iter().any(|d| d.path == "./util" && d.is_relative));
    assert!(deps.iter().any(|d| d.path == "fs" && !d.is_relative));

    assert_eq!(engine.get_stats().unwrap().total_dependencies, 2);
}

#[tokio::test]
async fn batch_progress_reports_every_file() {
    let ws = TempDir::new().unwrap();
    for i in 0..7 {
        fs::write(
            ws.path().join(format!("f{i}.ts")),
            format!("export const v{i} = {i};"),
        )
        .unwrap();
    }

    let engine = engine_for(ws.path());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let progress: ProgressCallback = Arc::new(move |progress| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(progress.total_files, 7);
        assert!(progress.processed_files >= 1 && progress.processed_files <= 7);
        assert!(progress.percentage > 0.0 && progress.percentage <= 100.0);
    });

    let files: Vec<_> = (0..7).map(|i| ws.path().join(format!("f{i}.ts"))).collect();
    let outcome = engine
        .batch_index_files(
            files,
            BatchOptions {
                concurrency: Some(2),
                batch_size: Some(3),
                progress: Some(progress),
            },
        )
        .await;

    assert_eq!(outcome.processed, 7);
    assert_eq!(outcome.indexed, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn symbol_locations_always_resolve_to_indexed_files() {
    let ws = TempDir::new().unwrap();
    fs::write(
        ws.path().join("a.ts"),
        "export class A { run(){} }\nexport function standalone(){}\n",
    )
    .unwrap();
    fs::write(ws.path().join("b.ts"), "export const answer = 42;").unwrap();

    let engine = engine_for(ws.path());
    engine.index_project(None).await.unwrap();

    for hit in engine.search_symbols("", &SearchOptions::default()).unwrap() {
        assert!(engine.file_index().has_file(&hit.symbol.location.file_path));
        assert!(hit.score >= 0.0 && hit.score <= 1.0);
    }
}
