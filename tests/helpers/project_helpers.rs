//! Project setup over an in-memory file system.

use std::sync::Arc;

use anchorage::base::FileId;
use anchorage::parser::SyntaxKind;
use anchorage::project::{MemoryFileSystem, Project, ProjectConfig, TreeChangeEvent};
use anchorage::syntax::Element;
use anchorage::{TextRange, TextSize};
use parking_lot::Mutex;

pub struct Fixture {
    pub project: Project,
    pub fs: Arc<MemoryFileSystem>,
    pub file: FileId,
}

/// A project with one file at `path`, stored in memory.
pub fn project_with_file(path: &str, text: &str) -> Fixture {
    project_with_config(ProjectConfig::default(), path, text)
}

pub fn project_with_config(config: ProjectConfig, path: &str, text: &str) -> Fixture {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.insert(path, text);
    let project = Project::new(config, fs.clone());
    let file = project.add_file(path);
    Fixture { project, fs, file }
}

/// Range of the first occurrence of `needle` in `text`.
pub fn range_of(text: &str, needle: &str) -> TextRange {
    let start = text
        .find(needle)
        .unwrap_or_else(|| panic!("'{needle}' not found in {text:?}"));
    TextRange::at(offset(start), TextSize::of(needle))
}

pub fn offset_of(text: &str, needle: &str) -> TextSize {
    range_of(text, needle).start()
}

pub fn offset(value: usize) -> TextSize {
    TextSize::new(value as u32)
}

pub fn text_range(start: u32, end: u32) -> TextRange {
    TextRange::new(start.into(), end.into())
}

/// Declaration of `kind` named `name` in the file's current view, found
/// through the stub tree.
pub fn declaration(project: &Project, file: FileId, kind: SyntaxKind, name: &str) -> Element {
    fn walk(element: Element, kind: SyntaxKind, name: &str) -> Option<Element> {
        if element.kind() == kind && element.name().as_deref() == Some(name) {
            return Some(element);
        }
        element
            .stub_children()
            .into_iter()
            .find_map(|child| walk(child, kind, name))
    }
    let root = project.file_element(file).unwrap();
    walk(root, kind, name).unwrap_or_else(|| panic!("no {kind:?} named {name}"))
}

/// Record every tree change event of the project.
pub fn record_tree_events(project: &Project) -> Arc<Mutex<Vec<TreeChangeEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    project.add_tree_change_listener(move |_: &Project, event: &TreeChangeEvent| {
        sink.lock().push(event.clone());
    });
    events
}
