//! The per-strand chain of active context stacks.
//!
//! A strand (a thread of control, or a coroutine that owns its own context
//! scope) resolves "the current context" against the head of its chain. The
//! chain is a stack of links: the strand's own anchor link at the bottom,
//! created lazily on first use, plus one link per coroutine scope that is
//! currently interposed. Each link holds the top of its own stack of
//! entered contexts (threaded through the contexts themselves).
//!
//! Links are owned `Rc` handles held in a growable stack, so splicing a
//! resumed coroutine in and out is O(1) at the head and never leaves a
//! dangling back-pointer behind, whatever outlives what.

use crate::context::Context;
use std::cell::RefCell;
use std::rc::Rc;

/// One link in a strand's context chain
#[derive(Debug)]
pub(crate) struct Link {
    /// Top of this link's stack of entered contexts
    pub(crate) top: Option<Rc<Context>>,
    /// Whether this is the strand's own anchor link
    pub(crate) is_anchor: bool,
    /// Whether the link is currently spliced into a chain
    pub(crate) linked: bool,
}

pub(crate) type LinkHandle = Rc<RefCell<Link>>;

pub(crate) fn new_link(is_anchor: bool) -> LinkHandle {
    Rc::new(RefCell::new(Link {
        top: None,
        is_anchor,
        linked: is_anchor,
    }))
}

/// A strand's stack of context-chain links
///
/// Index 0 is the anchor once lazily initialized; the head is the last
/// element. The anchor never leaves the chain.
#[derive(Debug, Default)]
pub struct ContextChain {
    links: Vec<LinkHandle>,
}

impl ContextChain {
    pub(crate) fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Head of the chain, lazily initializing the anchor link.
    pub(crate) fn head(&mut self) -> LinkHandle {
        if self.links.is_empty() {
            self.links.push(new_link(true));
        }
        self.links.last().expect("chain is non-empty").clone()
    }

    /// Splice `link` in as the new head.
    ///
    /// The link must not already be part of a chain; violating that is a
    /// programming error, not a recoverable condition.
    pub(crate) fn link(&mut self, link: &LinkHandle) {
        assert!(!link.borrow().linked, "context-chain link is already linked");
        self.head(); // ensure the anchor exists below
        link.borrow_mut().linked = true;
        self.links.push(link.clone());
    }

    /// Remove `link` from the chain.
    ///
    /// The link must currently be part of this chain.
    pub(crate) fn unlink(&mut self, link: &LinkHandle) {
        assert!(link.borrow().linked, "context-chain link is not linked");
        assert!(!link.borrow().is_anchor, "cannot unlink the anchor link");
        let pos = self
            .links
            .iter()
            .position(|l| Rc::ptr_eq(l, link))
            .expect("link belongs to a different chain");
        self.links.remove(pos);
        link.borrow_mut().linked = false;
    }

    /// Number of links currently in the chain (0 before lazy init).
    pub(crate) fn depth(&self) -> usize {
        self.links.len()
    }
}
