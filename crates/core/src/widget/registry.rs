//! The widget registry: kind-indexed storage plus the insertion-ordered
//! bridge tick list.
//!
//! Registration hands back a shared handle (`Rc<RefCell<T>>`) so a caller
//! can both keep a concretely-typed reference (to call bridge-specific
//! methods like `Master::step`) and let the registry hold a type-erased
//! view for kind-keyed lookup and the tick loop.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{BridgeDriver, Widget, WidgetKind};
use crate::common::error::DriverError;

/// Owns every widget and bridge driver registered for a simulation run.
#[derive(Default)]
pub struct WidgetRegistry {
    widgets: HashMap<WidgetKind, Vec<Rc<RefCell<dyn Widget>>>>,
    bridges: Vec<Rc<RefCell<dyn BridgeDriver>>>,
}

impl WidgetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plain widget (not part of the tick loop), such as the
    /// master, clock, loadmem, or peek/poke bridges.
    ///
    /// Every named [`WidgetKind`] other than [`WidgetKind::Stream`] and
    /// [`WidgetKind::Custom`] is a singleton by convention: at most one
    /// widget of that kind may ever be registered.
    ///
    /// # Errors
    /// Returns [`DriverError::DuplicateSingleton`] if a widget of the same
    /// kind is already registered.
    pub fn add_widget<T: Widget + 'static>(&mut self, widget: T) -> Result<Rc<RefCell<T>>, DriverError> {
        let kind = widget.kind();
        if self.widgets.get(&kind).is_some_and(|bucket| !bucket.is_empty()) {
            return Err(DriverError::DuplicateSingleton {
                kind: kind.to_string(),
            });
        }
        let rc = Rc::new(RefCell::new(widget));
        self.widgets
            .entry(kind)
            .or_default()
            .push(rc.clone() as Rc<RefCell<dyn Widget>>);
        Ok(rc)
    }

    /// Registers an already-constructed widget, preserving its reference
    /// identity. Used for widgets a caller must hold a concretely-typed
    /// handle to before the registry exists, such as the simulation master.
    ///
    /// # Errors
    /// Returns [`DriverError::DuplicateSingleton`] if a widget of the same
    /// kind is already registered.
    pub fn add_existing_widget<T: Widget + 'static>(
        &mut self,
        widget: Rc<RefCell<T>>,
    ) -> Result<(), DriverError> {
        let kind = widget.borrow().kind();
        if self.widgets.get(&kind).is_some_and(|bucket| !bucket.is_empty()) {
            return Err(DriverError::DuplicateSingleton {
                kind: kind.to_string(),
            });
        }
        self.widgets
            .entry(kind)
            .or_default()
            .push(widget as Rc<RefCell<dyn Widget>>);
        Ok(())
    }

    /// Registers a bridge driver: adds it to the kind index and to the
    /// insertion-ordered tick list.
    ///
    /// # Errors
    /// Returns [`DriverError::DuplicateSingleton`] if a widget of the same
    /// kind is already registered.
    pub fn add_bridge<T: BridgeDriver + 'static>(&mut self, bridge: T) -> Result<Rc<RefCell<T>>, DriverError> {
        let kind = bridge.kind();
        if self.widgets.get(&kind).is_some_and(|bucket| !bucket.is_empty()) {
            return Err(DriverError::DuplicateSingleton {
                kind: kind.to_string(),
            });
        }
        let rc = Rc::new(RefCell::new(bridge));
        self.widgets
            .entry(kind)
            .or_default()
            .push(rc.clone() as Rc<RefCell<dyn Widget>>);
        self.bridges.push(rc.clone() as Rc<RefCell<dyn BridgeDriver>>);
        Ok(rc)
    }

    /// Returns the bridge tick list in registration order.
    #[must_use]
    pub fn bridges(&self) -> &[Rc<RefCell<dyn BridgeDriver>>] {
        &self.bridges
    }

    /// Looks up the single widget of `kind`.
    ///
    /// # Errors
    /// Returns [`DriverError::MissingSingleton`] if no widget of that kind
    /// was registered.
    pub fn get_singleton(&self, kind: WidgetKind) -> Result<Rc<RefCell<dyn Widget>>, DriverError> {
        self.widgets
            .get(&kind)
            .and_then(|bucket| bucket.first())
            .cloned()
            .ok_or(DriverError::MissingSingleton {
                kind: kind.to_string(),
            })
    }

    /// Returns every widget registered under `kind`, in registration order.
    #[must_use]
    pub fn get_all(&self, kind: WidgetKind) -> &[Rc<RefCell<dyn Widget>>] {
        self.widgets.get(&kind).map_or(&[][..], Vec::as_slice)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::hostio::HostIo;
    use std::any::Any;

    struct Dummy(u32);

    impl Widget for Dummy {
        fn kind(&self) -> WidgetKind {
            WidgetKind::Custom("dummy")
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl BridgeDriver for Dummy {
        fn init(&mut self, _io: &mut dyn HostIo) {}
        fn tick(&mut self, _io: &mut dyn HostIo) {
            self.0 += 1;
        }
    }

    #[test]
    fn tick_list_preserves_registration_order() {
        let mut registry = WidgetRegistry::new();
        registry.add_bridge(Dummy(0)).unwrap();
        registry.add_bridge(Dummy(10)).unwrap();
        let values: Vec<_> = registry
            .bridges()
            .iter()
            .map(|b| b.borrow().as_any().downcast_ref::<Dummy>().unwrap().0)
            .collect();
        assert_eq!(values, vec![0, 10]);
    }

    #[test]
    fn duplicate_singleton_is_rejected() {
        let mut registry = WidgetRegistry::new();
        registry.add_bridge(Dummy(0)).unwrap();
        let err = registry.add_bridge(Dummy(1)).unwrap_err();
        assert!(matches!(err, DriverError::DuplicateSingleton { .. }));
    }

    #[test]
    fn missing_singleton_reports_kind() {
        let registry = WidgetRegistry::new();
        let err = registry.get_singleton(WidgetKind::Master).unwrap_err();
        assert!(matches!(err, DriverError::MissingSingleton { .. }));
    }

    #[test]
    fn add_existing_widget_preserves_identity() {
        let mut registry = WidgetRegistry::new();
        let handle = Rc::new(RefCell::new(Dummy(7)));
        registry.add_existing_widget(handle.clone()).unwrap();
        let looked_up = registry.get_singleton(WidgetKind::Custom("dummy")).unwrap();
        assert!(Rc::ptr_eq(&(handle as Rc<RefCell<dyn Widget>>), &looked_up));
        let err = registry.add_existing_widget(Rc::new(RefCell::new(Dummy(8)))).unwrap_err();
        assert!(matches!(err, DriverError::DuplicateSingleton { .. }));
    }
}
