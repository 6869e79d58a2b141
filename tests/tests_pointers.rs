#![allow(clippy::unwrap_used)]
//! Pointer registry: identity, reference counting and rebinding after edits.

#[path = "helpers/mod.rs"]
mod helpers;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anchorage::parser::SyntaxKind;
use anchorage::pointer::MAX_REFERENCE_COUNT;
use anchorage::project::{Project, TreeChangeEvent};
use anchorage::syntax::Element;
use anchorage::{PointerError, TextSize};
use parking_lot::Mutex;

use helpers::fixtures::{
    COMPACT_SHAPES, FUNCTION_BODY, FUNCTION_BODY_REFORMATTED, REFORMATTED_SHAPES, TWO_CLASSES,
    WITH_IMPORTS,
};
use helpers::project_helpers::{declaration, offset_of, project_with_file, range_of};

#[test]
fn test_same_element_same_pointer() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let point = declaration(project, file, SyntaxKind::CLASS, "Point");

    let first = project.create_pointer(&point).unwrap();
    let second = project.create_pointer(&point).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.reference_count(), 2);
    assert_eq!(project.pointer_count(file), 1);

    project.remove_pointer(&first).unwrap();
    assert!(second.range().unwrap().is_some());
    assert_eq!(second.element().unwrap(), Some(point));

    project.remove_pointer(&second).unwrap();
    assert!(second.is_disposed());
    assert_eq!(second.range().unwrap(), None);
    assert_eq!(second.element().unwrap(), None);
    assert_eq!(project.pointer_count(file), 0);
}

#[test]
fn test_double_removal_is_reported() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let line = declaration(project, file, SyntaxKind::CLASS, "Line");
    let pointer = project.create_pointer(&line).unwrap();

    project.remove_pointer(&pointer).unwrap();
    let error = project.remove_pointer(&pointer).unwrap_err();

    assert!(matches!(error, PointerError::DoubleRemoval { .. }));
    assert!(error.to_string().contains("double"));
}

#[test]
fn test_zero_edit_resolution_is_idempotent() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let field = declaration(project, file, SyntaxKind::FIELD, "y");
    let pointer = project.create_pointer(&field).unwrap();

    let first = pointer.element().unwrap();
    let second = pointer.element().unwrap();
    assert_eq!(first, second);
    assert_eq!(first, Some(field));
    assert_eq!(pointer.range().unwrap(), pointer.range().unwrap());
    assert_eq!(pointer.range().unwrap(), Some(range_of(TWO_CLASSES, "var y;")));
}

#[test]
fn test_creation_does_not_load_document() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let point = declaration(project, file, SyntaxKind::CLASS, "Point");

    let pointer = project.create_pointer(&point).unwrap();

    assert!(project.cached_document(file).is_none());
    assert_eq!(pointer.element().unwrap(), Some(point));
    assert!(project.cached_document(file).is_none());
}

#[test]
fn test_pointer_follows_edits_before_it() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let line = declaration(project, file, SyntaxKind::CLASS, "Line");
    let pointer = project.create_pointer(&line).unwrap();

    project
        .insert_text(file, TextSize::new(0), "class Empty {}\n")
        .unwrap();

    let element = pointer.element().unwrap().unwrap();
    assert_eq!(element.name().as_deref(), Some("Line"));
    assert_eq!(pointer.range().unwrap(), Some(element.range()));
    assert!(project.is_valid(&element));
    assert!(!project.is_valid(&line));
}

#[test]
fn test_survives_reformatting() {
    let fixture = project_with_file("shapes.mini", COMPACT_SHAPES);
    let (project, file) = (&fixture.project, fixture.file);
    let y = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "y"))
        .unwrap();
    let line = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "Line"))
        .unwrap();

    project.set_text(file, REFORMATTED_SHAPES).unwrap();

    let field = y.element().unwrap().unwrap();
    assert_eq!(field.kind(), SyntaxKind::FIELD);
    assert_eq!(field.text().unwrap(), "var y;");
    assert_eq!(field.parent().unwrap().name().as_deref(), Some("Point"));
    assert_eq!(y.range().unwrap(), Some(range_of(REFORMATTED_SHAPES, "var y;")));

    let class = line.element().unwrap().unwrap();
    assert_eq!(class.name().as_deref(), Some("Line"));
    assert_eq!(
        class.range().start(),
        offset_of(REFORMATTED_SHAPES, "class Line")
    );
}

#[test]
fn test_positional_pointer_survives_reformatting() {
    let fixture = project_with_file("body.mini", FUNCTION_BODY);
    let (project, file) = (&fixture.project, fixture.file);
    let name = project
        .find_element_at(file, offset_of(FUNCTION_BODY, "b = 2"))
        .unwrap();
    assert_eq!(name.kind(), SyntaxKind::NAME);
    let statement = name.parent().unwrap();
    assert_eq!(statement.kind(), SyntaxKind::LET_STMT);
    assert!(!statement.is_stub_based());
    let pointer = project.create_pointer(&statement).unwrap();

    project
        .replace_text(file, range_of(FUNCTION_BODY, "1"), "100")
        .unwrap();
    let moved = pointer.element().unwrap().unwrap();
    assert_eq!(moved.text().unwrap(), "let b = 2;");

    project.set_text(file, FUNCTION_BODY_REFORMATTED).unwrap();
    let reformatted = pointer.element().unwrap().unwrap();
    assert_eq!(reformatted.kind(), SyntaxKind::LET_STMT);
    assert_eq!(reformatted.text().unwrap(), "let b = 2;");
}

#[test]
fn test_deleted_declaration_resolves_to_nothing() {
    let text = "class A { var x; var y; }";
    let fixture = project_with_file("a.mini", text);
    let (project, file) = (&fixture.project, fixture.file);
    let x = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "x"))
        .unwrap();
    let y = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "y"))
        .unwrap();

    project.delete_text(file, range_of(text, "var x; ")).unwrap();

    assert_eq!(x.element().unwrap(), None);
    assert_eq!(x.range().unwrap(), None);
    let remaining = y.element().unwrap().unwrap();
    assert_eq!(remaining.name().as_deref(), Some("y"));
}

#[test]
fn test_import_list_pointer() {
    let fixture = project_with_file("shape.mini", WITH_IMPORTS);
    let (project, file) = (&fixture.project, fixture.file);
    let imports = project
        .file_element(file)
        .unwrap()
        .stub_children()
        .into_iter()
        .find(|child| child.kind() == SyntaxKind::IMPORT_LIST)
        .unwrap();
    let pointer = project.create_pointer(&imports).unwrap();

    project
        .set_text(file, "import geo.circle;\nclass Shape {}\n")
        .unwrap();

    let element = pointer.element().unwrap().unwrap();
    assert_eq!(element.kind(), SyntaxKind::IMPORT_LIST);
    assert_eq!(element.text().unwrap(), "import geo.circle;");
}

#[test]
fn test_stub_and_tree_routes_share_a_pointer() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let through_stubs = declaration(project, file, SyntaxKind::CLASS, "Point");
    let through_tree = project
        .find_element_at(file, offset_of(TWO_CLASSES, "Point"))
        .unwrap()
        .parent()
        .unwrap();
    assert_eq!(through_stubs, through_tree);

    let first = project.create_pointer(&through_stubs).unwrap();
    let second = project.create_pointer(&through_tree).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_pointer_from_older_view_is_reused() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let before = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "Line"))
        .unwrap();

    project.insert_text(file, TextSize::new(0), "\n\n").unwrap();
    project.commit_document(file).unwrap();

    let after = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "Line"))
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(after.reference_count(), 2);
}

#[test]
fn test_outdated_element_is_rejected() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let point = declaration(project, file, SyntaxKind::CLASS, "Point");

    project.insert_text(file, TextSize::new(0), " ").unwrap();
    project.commit_document(file).unwrap();

    let result = project.create_pointer(&point);
    assert!(matches!(result, Err(PointerError::InvalidElement(f)) if f == file));
}

#[test]
fn test_point_to_same_element() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let point = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "Point"))
        .unwrap();
    let line = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "Line"))
        .unwrap();
    let range = range_of(TWO_CLASSES, "var x;");
    let first_range = project.create_range_pointer(file, range).unwrap();
    let second_range = project.create_range_pointer(file, range).unwrap();

    assert!(project.point_to_same_element(&point, &point.clone()).unwrap());
    assert!(!project.point_to_same_element(&point, &line).unwrap());
    assert_ne!(first_range, second_range);
    assert!(project.point_to_same_element(&first_range, &second_range).unwrap());
}

#[test]
fn test_reference_count_saturates() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let point = declaration(project, file, SyntaxKind::CLASS, "Point");

    let pointers: Vec<_> = (0..1_000)
        .map(|_| project.create_pointer(&point).unwrap())
        .collect();
    assert_eq!(pointers[0].reference_count(), 1_000);
    for pointer in &pointers[1..] {
        project.remove_pointer(pointer).unwrap();
    }
    assert!(pointers[0].range().unwrap().is_some());
    project.remove_pointer(&pointers[0]).unwrap();
    assert!(pointers[0].is_disposed());

    let creations = usize::from(MAX_REFERENCE_COUNT) + 10;
    let mut last = None;
    for _ in 0..creations {
        last = Some(project.create_pointer(&point).unwrap());
    }
    let pinned = last.unwrap();
    assert_eq!(pinned.reference_count(), MAX_REFERENCE_COUNT);
    for _ in 0..creations {
        project.remove_pointer(&pinned).unwrap();
    }
    assert!(!pinned.is_disposed());
    assert_eq!(pinned.reference_count(), MAX_REFERENCE_COUNT);
    assert!(pinned.element().unwrap().is_some());
}

#[test]
fn test_creation_inside_tree_listener_is_refused() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let outcome: Arc<Mutex<Option<Result<(), String>>>> = Arc::new(Mutex::new(None));
    let sink = outcome.clone();
    project.add_tree_change_listener(move |project: &Project, event: &TreeChangeEvent| {
        let root = project.file_element(event.file()).unwrap();
        let result = project
            .create_pointer(&root)
            .map(|_| ())
            .map_err(|error| error.to_string());
        *sink.lock() = Some(result);
    });

    project.insert_text(file, TextSize::new(0), " ").unwrap();
    project.commit_document(file).unwrap();

    let outcome = outcome.lock().clone().unwrap();
    assert!(outcome.unwrap_err().contains("must not be created"));

    let root = project.file_element(file).unwrap();
    assert!(project.create_pointer(&root).is_ok());
}

#[test]
fn test_dropped_pointer_releases_its_range() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let point = declaration(project, file, SyntaxKind::CLASS, "Point");

    let pointer = project.create_pointer(&point).unwrap();
    assert_eq!(project.pointer_count(file), 1);
    drop(pointer);
    assert_eq!(project.pointer_count(file), 0);

    let again = project.create_pointer(&point).unwrap();
    assert_eq!(again.reference_count(), 1);
}

#[test]
fn test_pointer_creation_after_tree_listener_panic() {
    let fixture = project_with_file("shapes.mini", TWO_CLASSES);
    let (project, file) = (&fixture.project, fixture.file);
    let failed = AtomicBool::new(false);
    project.add_tree_change_listener(move |_: &Project, _: &TreeChangeEvent| {
        if !failed.swap(true, Ordering::SeqCst) {
            panic!("listener failure");
        }
    });

    project.insert_text(file, TextSize::new(0), " ").unwrap();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| project.commit_document(file)));
    assert!(outcome.is_err());

    let point = declaration(project, file, SyntaxKind::CLASS, "Point");
    let pointer = project.create_pointer(&point).unwrap();
    assert_eq!(pointer.element().unwrap(), Some(point));
}

#[test]
fn test_declaration_spanning_whole_text_survives_reformat() {
    let compact = "class A { var x; }";
    let reformatted = "class A {\n    var x;\n}\n";
    let fixture = project_with_file("a.mini", compact);
    let (project, file) = (&fixture.project, fixture.file);
    let class = project
        .create_pointer(&declaration(project, file, SyntaxKind::CLASS, "A"))
        .unwrap();
    let field = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "x"))
        .unwrap();

    project.set_text(file, reformatted).unwrap();

    let resolved = class.element().unwrap().unwrap();
    assert_eq!(resolved.kind(), SyntaxKind::CLASS);
    assert_eq!(resolved.name().as_deref(), Some("A"));
    assert_eq!(resolved.range(), range_of(reformatted, "class A {\n    var x;\n}"));
    assert_eq!(class.range().unwrap(), Some(resolved.range()));

    let resolved = field.element().unwrap().unwrap();
    assert_eq!(resolved.range(), range_of(reformatted, "var x;"));
}

#[test]
fn test_same_named_siblings_keep_their_order() {
    let compact = "class A { var x; var x; }";
    let reformatted = "class A {\n    var x;\n    var x;\n}\n";
    let fixture = project_with_file("a.mini", compact);
    let (project, file) = (&fixture.project, fixture.file);
    let class = declaration(project, file, SyntaxKind::CLASS, "A");
    let fields: Vec<Element> = class.stub_children();
    assert_eq!(fields.len(), 2);
    let first = project.create_pointer(&fields[0]).unwrap();
    let second = project.create_pointer(&fields[1]).unwrap();
    assert_ne!(first, second);

    project.set_text(file, reformatted).unwrap();

    let first_start = reformatted.find("var x;").unwrap();
    let second_start = reformatted.rfind("var x;").unwrap();
    let first = first.element().unwrap().unwrap();
    let second = second.element().unwrap().unwrap();
    assert_eq!(usize::from(first.range().start()), first_start);
    assert_eq!(usize::from(second.range().start()), second_start);
    assert_ne!(first, second);
}

#[test]
fn test_covering_element_after_language_change_is_not_shared() {
    let fixture = project_with_file("a.mini", "class A { var x; }");
    let (project, file) = (&fixture.project, fixture.file);
    let field = project
        .create_pointer(&declaration(project, file, SyntaxKind::FIELD, "x"))
        .unwrap();

    project.rename_file(file, "a.txt").unwrap();

    let line = field.element().unwrap().unwrap();
    assert_eq!(line.kind(), SyntaxKind::PLAIN_TEXT);
    assert_eq!(line.text().unwrap(), "class A { var x; }");
    assert_eq!(field.kind(), SyntaxKind::FIELD);

    let for_line = project.create_pointer(&line).unwrap();
    assert_ne!(for_line, field);
    assert_eq!(for_line.reference_count(), 1);
    assert_eq!(field.element().unwrap(), Some(line));
}
