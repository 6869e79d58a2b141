#![allow(clippy::unwrap_used)]
//! Pointer resolution from many threads.

#[path = "helpers/mod.rs"]
mod helpers;

use std::path::Path;
use std::thread;

use anchorage::parser::SyntaxKind;
use anchorage::project::{ProjectConfig, TreeChangeEvent};
use anchorage::{SmartPointer, TextSize};

use helpers::fixtures::{COMPACT_SHAPES, TWO_CLASSES};
use helpers::project_helpers::{declaration, project_with_config, project_with_file, record_tree_events};

const THREADS: usize = 8;

#[test]
fn test_parallel_resolution_commits_once() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let events = record_tree_events(project);
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "start"))
        .unwrap();
    project.insert_text(file, TextSize::new(0), "class Extra {}\n").unwrap();

    let names: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let pointer = pointer.clone();
                scope.spawn(move || pointer.element().unwrap().unwrap().name())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(names.iter().all(|name| name.as_deref() == Some("start")));
    let reparses = events
        .lock()
        .iter()
        .filter(|event| matches!(event, TreeChangeEvent::Reparsed { .. }))
        .count();
    assert_eq!(reparses, 1);
}

#[test]
fn test_resolve_all() {
    let fixture = project_with_file("shapes.mini", COMPACT_SHAPES);
    let (project, file) = (&fixture.project, fixture.file);
    let pointers: Vec<SmartPointer> = ["x", "y", "start", "end"]
        .into_iter()
        .map(|name| {
            project
                .create_pointer(&declaration(project, file, SyntaxKind::FIELD, name))
                .unwrap()
        })
        .collect();
    project.insert_text(file, TextSize::new(0), "\n\n").unwrap();

    let resolved = project.resolve_all(&pointers);

    assert!(!project.has_uncommitted(file));
    let names: Vec<_> = resolved
        .into_iter()
        .map(|result| result.unwrap().unwrap().name().unwrap())
        .collect();
    assert_eq!(names, ["x", "y", "start", "end"]);
}

#[test]
fn test_concurrent_reload_reads_once() {
    let config = ProjectConfig::default().with_stub_index(false);
    let fixture = project_with_config(config, "shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    project.file_element(file).unwrap();
    assert!(project.unload_file(file).unwrap());
    let reads = fixture.fs.read_count(Path::new("shapes.mini"));

    let roots: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| scope.spawn(|| project.file_element(file).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(fixture.fs.read_count(Path::new("shapes.mini")), reads + 1);
    assert!(roots.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_edits_interleaved_with_resolution() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "Line"))
        .unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..50 {
                project.insert_text(file, TextSize::new(0), " ").unwrap();
            }
        });
        scope.spawn(|| {
            for _ in 0..50 {
                let line = pointer.element().unwrap().unwrap();
                assert_eq!(line.name().as_deref(), Some("Line"));
            }
        });
    });

    let line = pointer.element().unwrap().unwrap();
    let text = project.document(file).unwrap().text().to_string();
    assert_eq!(usize::from(line.range().start()), text.find("class Line").unwrap());
}
