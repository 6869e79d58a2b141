//! File views and the elements they hand out.
//!
//! A [`FileView`] is the structure of one file at one modification stamp. It
//! always has the stub tree; the full syntax tree is attached lazily and can
//! be dropped again while the view stays alive. An [`Element`] is a node of a
//! view. Declarations are always addressed through their stub, so the same
//! declaration reached through the stubs or through the full tree is one
//! element.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rowan::TextRange;
use smol_str::SmolStr;

use super::ast::AstTree;
use super::language::Language;
use super::path::NodePath;
use super::stub::StubTree;
use super::table::{NodeData, NodeTable};
use crate::base::FileId;
use crate::parser::{SyntaxKind, SyntaxNode};
use crate::project::ProjectError;

/// Source of full syntax trees for views whose tree is not loaded.
pub trait AstLoader: Send + Sync {
    fn load_ast(&self, view: &FileView) -> Result<Arc<AstTree>, ProjectError>;
}

pub struct FileView {
    file: FileId,
    generation: u64,
    stamp: u64,
    stubs: Arc<StubTree>,
    ast: Mutex<Option<Arc<AstTree>>>,
    loading: Mutex<()>,
    loader: Option<Weak<dyn AstLoader>>,
}

impl FileView {
    pub fn new(
        file: FileId,
        generation: u64,
        stamp: u64,
        stubs: Arc<StubTree>,
        ast: Option<Arc<AstTree>>,
        loader: Option<Weak<dyn AstLoader>>,
    ) -> Self {
        Self {
            file,
            generation,
            stamp,
            stubs,
            ast: Mutex::new(ast),
            loading: Mutex::new(()),
            loader,
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    /// Unique per view; a new view is created for every reparse.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Modification stamp of the text this view was built from.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn language(&self) -> Language {
        self.stubs.language()
    }

    pub fn stubs(&self) -> &Arc<StubTree> {
        &self.stubs
    }

    pub fn loaded_ast(&self) -> Option<Arc<AstTree>> {
        self.ast.lock().clone()
    }

    pub fn is_ast_loaded(&self) -> bool {
        self.ast.lock().is_some()
    }

    /// The full tree, loading it through the owning file when needed.
    /// Concurrent callers wait for a single load.
    pub fn ast(&self) -> Result<Arc<AstTree>, ProjectError> {
        if let Some(ast) = self.loaded_ast() {
            return Ok(ast);
        }
        // The loader takes file locks, so the slot itself is not held while loading.
        let _loading = self.loading.lock();
        if let Some(ast) = self.loaded_ast() {
            return Ok(ast);
        }
        let loader = self
            .loader
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(ProjectError::StaleView)?;
        let ast = loader.load_ast(self)?;
        *self.ast.lock() = Some(ast.clone());
        Ok(ast)
    }

    /// Returns `true` if a tree was dropped.
    pub fn unload_ast(&self) -> bool {
        self.ast.lock().take().is_some()
    }
}

impl fmt::Debug for FileView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileView")
            .field("file", &self.file)
            .field("generation", &self.generation)
            .field("stamp", &self.stamp)
            .field("language", &self.language())
            .field("ast_loaded", &self.is_ast_loaded())
            .finish()
    }
}

/// Address of an element inside its view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementId {
    Stub(u32),
    Ast(u32),
}

#[derive(Clone)]
enum Backing {
    Stub(u32),
    Ast(Arc<AstTree>, u32),
}

/// A live node of a [`FileView`].
#[derive(Clone)]
pub struct Element {
    view: Arc<FileView>,
    backing: Backing,
}

impl Element {
    pub fn root(view: Arc<FileView>) -> Self {
        Self::from_stub(view, 0)
    }

    pub(crate) fn from_stub(view: Arc<FileView>, stub: u32) -> Self {
        Self {
            view,
            backing: Backing::Stub(stub),
        }
    }

    /// Element for a full-tree index, addressed through its stub when it has one.
    pub(crate) fn from_ast(view: Arc<FileView>, ast: Arc<AstTree>, index: u32) -> Self {
        let backing = match ast.stub_of(index) {
            Some(stub) => Backing::Stub(stub),
            None => Backing::Ast(ast, index),
        };
        Self { view, backing }
    }

    /// Rebuild an element from a cached id. Full-tree ids need the tree to
    /// still be loaded.
    pub(crate) fn from_id(view: Arc<FileView>, id: ElementId) -> Option<Self> {
        match id {
            ElementId::Stub(stub) => {
                view.stubs().table().get(stub)?;
                Some(Self::from_stub(view, stub))
            }
            ElementId::Ast(index) => {
                let ast = view.loaded_ast()?;
                ast.table().get(index)?;
                Some(Self::from_ast(view, ast, index))
            }
        }
    }

    pub fn view(&self) -> &Arc<FileView> {
        &self.view
    }

    pub fn id(&self) -> ElementId {
        match self.backing {
            Backing::Stub(stub) => ElementId::Stub(stub),
            Backing::Ast(_, index) => ElementId::Ast(index),
        }
    }

    pub fn file(&self) -> FileId {
        self.view.file()
    }

    pub fn language(&self) -> Language {
        self.view.language()
    }

    fn table_and_index(&self) -> (&NodeTable, u32) {
        match &self.backing {
            Backing::Stub(stub) => (self.view.stubs().table(), *stub),
            Backing::Ast(ast, index) => (ast.table(), *index),
        }
    }

    fn data(&self) -> Option<&NodeData> {
        let (table, index) = self.table_and_index();
        table.get(index)
    }

    pub fn kind(&self) -> SyntaxKind {
        self.data()
            .map(|n| n.kind)
            .unwrap_or(SyntaxKind::ERROR)
    }

    /// Range in the text of the view's stamp.
    pub fn range(&self) -> TextRange {
        self.data().map(|n| n.range).unwrap_or_default()
    }

    pub fn name(&self) -> Option<SmolStr> {
        self.data().and_then(|n| n.name.clone())
    }

    pub fn path(&self) -> NodePath {
        let (table, index) = self.table_and_index();
        table.path(index)
    }

    pub fn is_stub_based(&self) -> bool {
        matches!(self.backing, Backing::Stub(_))
    }

    pub fn is_root(&self) -> bool {
        matches!(self.backing, Backing::Stub(0))
    }

    pub fn parent(&self) -> Option<Element> {
        match &self.backing {
            Backing::Stub(stub) => {
                let parent = self.view.stubs().table().get(*stub)?.parent?;
                Some(Self::from_stub(self.view.clone(), parent))
            }
            Backing::Ast(ast, index) => {
                let parent = ast.table().get(*index)?.parent?;
                Some(Self::from_ast(self.view.clone(), ast.clone(), parent))
            }
        }
    }

    /// Declaration children, answered from the stub tree alone.
    pub fn stub_children(&self) -> Vec<Element> {
        let Backing::Stub(stub) = self.backing else {
            return Vec::new();
        };
        self.view
            .stubs()
            .table()
            .get(stub)
            .map(|n| {
                n.children
                    .iter()
                    .map(|&c| Self::from_stub(self.view.clone(), c))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn ast_and_index(&self) -> Result<(Arc<AstTree>, u32), ProjectError> {
        match &self.backing {
            Backing::Ast(ast, index) => Ok((ast.clone(), *index)),
            Backing::Stub(stub) => {
                let ast = self.view.ast()?;
                let index = ast.ast_of_stub(*stub).ok_or(ProjectError::StaleView)?;
                Ok((ast, index))
            }
        }
    }

    /// All node children. Loads the full tree for stub-based elements.
    pub fn children(&self) -> Result<Vec<Element>, ProjectError> {
        let (ast, index) = self.ast_and_index()?;
        let children = ast
            .table()
            .get(index)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        Ok(children
            .into_iter()
            .map(|c| Self::from_ast(self.view.clone(), ast.clone(), c))
            .collect())
    }

    /// The rowan node. Loads the full tree for stub-based elements.
    pub fn syntax(&self) -> Result<SyntaxNode, ProjectError> {
        let (ast, index) = self.ast_and_index()?;
        ast.syntax(index).ok_or(ProjectError::StaleView)
    }

    pub fn text(&self) -> Result<String, ProjectError> {
        Ok(self.syntax()?.text().to_string())
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.view, &other.view) && self.id() == other.id()
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.view.generation().hash(state);
        self.id().hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("file", &self.file())
            .field("generation", &self.view.generation())
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("range", &self.range())
            .finish()
    }
}
