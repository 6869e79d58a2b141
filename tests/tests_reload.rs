#![allow(clippy::unwrap_used)]
//! Unloading and lazy reconstruction of trees and documents.

#[path = "helpers/mod.rs"]
mod helpers;

use std::path::Path;

use anchorage::parser::SyntaxKind;
use anchorage::project::{ProjectConfig, ProjectError, TreeChangeEvent};
use anchorage::{Language, TextSize};
use tokio_util::sync::CancellationToken;

use helpers::fixtures::{COMPACT_SHAPES, REFORMATTED_SHAPES, TWO_CLASSES, TWO_LINES};
use helpers::project_helpers::{
    declaration, project_with_config, project_with_file, range_of, record_tree_events,
};

#[test]
fn test_stub_index_resolution_skips_ast_and_disk() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let path = Path::new("shapes.mini");
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "x"))
        .unwrap();
    let reads = fixture.fs.read_count(path);

    assert!(project.unload_file(file).unwrap());
    assert!(!project.is_ast_loaded(file));

    let field = pointer.element().unwrap().unwrap();
    assert_eq!(field.name().as_deref(), Some("x"));
    assert_eq!(field.range(), range_of(TWO_CLASSES, "var x;"));
    assert!(!project.is_ast_loaded(file));
    assert!(project.cached_document(file).is_none());
    assert_eq!(fixture.fs.read_count(path), reads);

    // the full tree is parsed on demand from the saved text
    assert_eq!(field.text().unwrap(), "var x;");
    assert!(project.is_ast_loaded(file));
    assert_eq!(fixture.fs.read_count(path), reads + 1);
}

#[test]
fn test_reload_keeps_identity_of_held_elements() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let line = declaration(project, file, SyntaxKind::CLASS, "Line");
    let pointer = project.create_pointer(&line).unwrap();

    assert!(project.unload_file(file).unwrap());
    assert!(project.is_valid(&line));

    assert_eq!(pointer.element().unwrap(), Some(line.clone()));
    assert!(project.is_valid(&line));
    assert_eq!(project.file_element(file).unwrap().view().generation(), line.view().generation());
}

#[test]
fn test_unload_ast_keeps_stub_elements() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let point = declaration(project, file, SyntaxKind::CLASS, "Point");
    let pointer = project.create_pointer(&point).unwrap();

    assert!(project.unload_ast(file).unwrap());
    assert!(!project.unload_ast(file).unwrap());
    assert!(!project.is_ast_loaded(file));

    assert_eq!(pointer.element().unwrap(), Some(point.clone()));
    assert_eq!(point.stub_children().len(), 2);
    assert!(!project.is_ast_loaded(file));
}

#[test]
fn test_unload_refused_with_pending_changes() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "Line"))
        .unwrap();

    project.insert_text(file, TextSize::new(0), "\n").unwrap();
    assert!(!project.unload_ast(file).unwrap());
    assert!(!project.unload_file(file).unwrap());

    project.commit_document(file).unwrap();
    assert!(project.unload_file(file).unwrap());
    // unsaved text stays in memory
    assert!(project.cached_document(file).is_some());

    let line = pointer.element().unwrap().unwrap();
    assert_eq!(line.name().as_deref(), Some("Line"));
    assert_eq!(
        line.range().start(),
        range_of(TWO_CLASSES, "class Line").start() + TextSize::new(1)
    );
}

#[test]
fn test_saved_document_is_dropped_on_unload() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "end"))
        .unwrap();

    project.insert_text(file, TextSize::new(0), "// saved\n").unwrap();
    project.commit_document(file).unwrap();
    project.save_document(file).unwrap();
    assert!(fixture.fs.contents(Path::new("shapes.mini")).unwrap().starts_with("// saved"));

    assert!(project.unload_file(file).unwrap());
    assert!(project.cached_document(file).is_none());

    let field = pointer.element().unwrap().unwrap();
    assert_eq!(field.name().as_deref(), Some("end"));
}

#[test]
fn test_io_failure_is_recoverable() {
    let config = ProjectConfig::default().with_stub_index(false);
    let fixture = project_with_config(config, "shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "Point"))
        .unwrap();
    assert!(project.unload_file(file).unwrap());

    fixture.fs.fail_reads("shapes.mini");
    let error = pointer.element().unwrap_err();
    assert!(matches!(error, ProjectError::Io { .. }));
    assert!(!pointer.is_disposed());
    assert_eq!(project.pointer_count(file), 1);

    fixture.fs.clear_failure(Path::new("shapes.mini"));
    let point = pointer.element().unwrap().unwrap();
    assert_eq!(point.name().as_deref(), Some("Point"));
}

#[test]
fn test_reload_from_disk_rebinds_declarations() {
    let fixture = project_with_file("shapes.mini", COMPACT_SHAPES);
    let (project, file) = (&fixture.project, fixture.file);
    let events = record_tree_events(project);
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "start"))
        .unwrap();
    project.document(file).unwrap();

    fixture.fs.insert("shapes.mini", REFORMATTED_SHAPES);
    project.reload_from_disk(file).unwrap();

    assert_eq!(project.document(file).unwrap().text(), REFORMATTED_SHAPES);
    assert!(!project.has_uncommitted(file));
    assert!(matches!(
        events.lock().as_slice(),
        [TreeChangeEvent::Reloaded { .. }]
    ));
    let field = pointer.element().unwrap().unwrap();
    assert_eq!(field.range(), range_of(REFORMATTED_SHAPES, "var start;"));
}

#[test]
fn test_reload_failure_changes_nothing() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    project.insert_text(file, TextSize::new(0), " ").unwrap();

    fixture.fs.fail_reads("shapes.mini");
    assert!(project.reload_from_disk(file).is_err());

    let document = project.document(file).unwrap();
    assert!(document.text().starts_with(" class Point"));
    assert!(project.has_uncommitted(file));
}

#[test]
fn test_deleted_file_pointers_resolve_to_nothing() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "Point"))
        .unwrap();

    project.delete_file(file).unwrap();

    assert_eq!(pointer.element().unwrap(), None);
    assert_eq!(pointer.range().unwrap(), None);
    assert!(matches!(
        project.file_element(file),
        Err(ProjectError::FileDeleted(_))
    ));
    assert!(project.file_id("shapes.mini").is_none());
}

#[test]
fn test_cancelled_resolution_leaves_pointer_usable() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "y"))
        .unwrap();
    project.insert_text(file, TextSize::new(0), "\n").unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let error = pointer.element_with_cancel(&cancel).unwrap_err();
    assert!(error.is_cancelled());

    let field = pointer.element().unwrap().unwrap();
    assert_eq!(field.name().as_deref(), Some("y"));
    assert_eq!(project.pointer_count(file), 1);
}

#[test]
fn test_file_type_change() {
    let fixture = project_with_file("shapes.mini", TWO_LINES);
    let (project, file) = (&fixture.project, fixture.file);
    let events = record_tree_events(project);
    let pointer = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "B"))
        .unwrap();

    project.rename_file(file, "shapes.txt").unwrap();

    assert_eq!(project.language(file).unwrap(), Language::PlainText);
    assert!(matches!(
        events.lock().as_slice(),
        [TreeChangeEvent::LanguageChanged {
            old: Language::Mini,
            new: Language::PlainText,
            ..
        }]
    ));
    let line = pointer.element().unwrap().unwrap();
    assert_eq!(line.kind(), SyntaxKind::PLAIN_TEXT);
    assert_eq!(line.text().unwrap(), "class B {}");
    assert_eq!(pointer.kind(), SyntaxKind::PLAIN_TEXT);

    project.set_language(file, Language::Mini).unwrap();
    let class = pointer.element().unwrap().unwrap();
    assert_eq!(class.kind(), SyntaxKind::CLASS);
    assert_eq!(class.name().as_deref(), Some("B"));
}
