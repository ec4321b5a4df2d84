//! Removal of the intermediate levels of a component tree.
use tracing::debug;

use super::{Bench, ComponentId, ComponentKind, Coupling, ModelError};
use crate::ports::PortId;

impl Bench {
    /// Flattens the bench so that the root is the only coupled component.
    ///
    /// Every nested coupled component is inlined into the root, top down.
    /// Inlined children are renamed after the path of the component they were
    /// taken from, e.g. `ef.generator`. Couplings that went through the
    /// boundary ports of an inlined component are rewired to the ports of its
    /// former children, so that every port of the flattened bench receives
    /// the same values in the same order as in the original one. Boundary
    /// ports with no counterpart on the other side simply disappear.
    ///
    /// Flattening an already flat bench has no effect.
    pub fn flatten(&mut self) -> Result<(), ModelError> {
        debug!("bench before flattening:\n{}", self.describe());
        let root = self.root;
        for child in self.network(root)?.children.clone() {
            if !self.is_atomic(child)? {
                self.absorb(child, root)?;
            }
        }
        debug!("bench after flattening:\n{}", self.describe());

        Ok(())
    }

    /// Inlines a coupled component and all its coupled descendants into its
    /// parent.
    ///
    /// Within a parent other than the root, the values that reach a port
    /// through internal couplings are delivered before those that reach it
    /// through external-input couplings, whatever the order of the couplings
    /// they were forwarded by.
    pub fn inline(&mut self, id: ComponentId) -> Result<(), ModelError> {
        self.network(id)?;
        let component = self.component(id)?;
        let parent = component
            .parent
            .ok_or_else(|| ModelError::NoParent(component.name.clone()))?;

        self.absorb(id, parent)
    }

    fn absorb(&mut self, id: ComponentId, parent: ComponentId) -> Result<(), ModelError> {
        let children = self.network(id)?.children.clone();
        self.inline_into(id, parent)?;
        for child in children {
            if !self.is_atomic(child)? {
                self.absorb(child, parent)?;
            }
        }

        Ok(())
    }

    /// Moves the children and couplings of `id` into `parent`.
    ///
    /// Rewired couplings take the place of the couplings they replace, so the
    /// order in which values reach each port is unchanged.
    fn inline_into(&mut self, id: ComponentId, parent: ComponentId) -> Result<(), ModelError> {
        self.network(id)?;
        let component = self
            .components
            .try_remove(id.0)
            .ok_or(ModelError::UnknownComponent(id))?;
        let ComponentKind::Coupled(inner) = component.kind else {
            return Err(ModelError::NotCoupled(component.name));
        };
        let outer = self.network(parent)?;

        let mut eic = Vec::with_capacity(outer.eic.len());
        let mut ic = Vec::with_capacity(outer.ic.len() + inner.ic.len());
        let mut eoc = Vec::with_capacity(outer.eoc.len());
        let mut eic_feeds = Vec::new();
        let mut ic_feeds = Vec::new();

        for &coupling in &outer.eic {
            if coupling.to.component == id {
                eic_feeds.push(coupling);
            } else {
                eic.push(coupling);
            }
        }
        for &coupling in &outer.ic {
            if coupling.to.component == id {
                ic_feeds.push(coupling);
            } else if coupling.from.component == id {
                let rewired = exits(&inner.eoc, coupling.from)
                    .map(|from| Coupling::new(from, coupling.to));
                ic.extend(rewired);
            } else {
                ic.push(coupling);
            }
        }
        for &coupling in &outer.eoc {
            if coupling.from.component == id {
                let rewired = exits(&inner.eoc, coupling.from)
                    .map(|from| Coupling::new(from, coupling.to));
                eoc.extend(rewired);
            } else {
                eoc.push(coupling);
            }
        }

        // The former children receive the values of their siblings first,
        // then the values forwarded from the boundary, forward by forward.
        ic.extend_from_slice(&inner.ic);
        for forward in &inner.eic {
            for feed in eic_feeds.iter().filter(|c| c.to == forward.from) {
                eic.push(Coupling::new(feed.from, forward.to));
            }
            for feed in ic_feeds.iter().filter(|c| c.to == forward.from) {
                if feed.from.component == id {
                    // Feedback loop around the inlined component.
                    let rewired =
                        exits(&inner.eoc, feed.from).map(|from| Coupling::new(from, forward.to));
                    ic.extend(rewired);
                } else {
                    ic.push(Coupling::new(feed.from, forward.to));
                }
            }
        }

        for &child in &inner.children {
            if let Some(c) = self.components.get_mut(child.0) {
                c.parent = Some(parent);
                c.name = format!("{}.{}", component.name, c.name);
            }
        }

        let outer = self.network_mut(parent)?;
        outer.eic = eic;
        outer.ic = ic;
        outer.eoc = eoc;
        if let Some(position) = outer.children.iter().position(|&c| c == id) {
            outer.children.splice(position..=position, inner.children);
        }

        Ok(())
    }
}

/// Returns the child ports coupled to an output port of a coupled component,
/// in coupling order.
fn exits(eoc: &[Coupling], port: PortId) -> impl Iterator<Item = PortId> + '_ {
    eoc.iter().filter(move |c| c.to == port).map(|c| c.from)
}
