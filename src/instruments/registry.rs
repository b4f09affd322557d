//! Instrument registry keyed by exported name.
//!
//! Instruments are created lazily on first use and live for the rest of the
//! process. Creation happens under the map lock, so concurrent first-time
//! callers for one name observe a single SDK instrument.

use opentelemetry::metrics::Meter;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{Instrument, InstrumentKind, InstrumentOptions, RegistryError};

/// Registry of typed instrument handles.
pub struct InstrumentRegistry {
    meter: Meter,
    /// Map of exported name -> shared handle
    instruments: Mutex<HashMap<String, Arc<Instrument>>>,
    created: AtomicUsize,
    closed: AtomicBool,
}

impl InstrumentRegistry {
    /// Create an empty registry creating instruments from `meter`.
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            instruments: Mutex::new(HashMap::new()),
            created: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// The meter new instruments are created from.
    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Return the instrument registered under `name`, creating it if absent.
    ///
    /// `options` only apply on creation, except for the namespace which is
    /// part of the identity. Requesting an existing name with a different
    /// kind fails with [`RegistryError::KindMismatch`].
    pub fn get_or_create(
        &self,
        name: &str,
        kind: InstrumentKind,
        options: &InstrumentOptions,
    ) -> Result<Arc<Instrument>, RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::Closed);
        }

        let name = options.qualified_name(name);
        let mut instruments = self.instruments.lock().unwrap_or_else(PoisonError::into_inner);
        // close() flips the flag under this lock
        if self.is_closed() {
            return Err(RegistryError::Closed);
        }

        if let Some(existing) = instruments.get(&name) {
            if existing.kind() != kind {
                return Err(RegistryError::KindMismatch {
                    name,
                    existing: existing.kind(),
                    requested: kind,
                });
            }
            return Ok(Arc::clone(existing));
        }

        let instrument = Arc::new(Instrument::build(&self.meter, name.clone(), kind, options));
        instruments.insert(name, Arc::clone(&instrument));
        self.created.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            instrument = instrument.name(),
            kind = %kind,
            "Created instrument"
        );

        Ok(instrument)
    }

    /// Look up an already registered instrument by exported name.
    pub fn get(&self, name: &str) -> Option<Arc<Instrument>> {
        self.instruments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.instruments.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of instruments ever created by this registry.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Reject all further lookups. Idempotent.
    ///
    /// Once this returns no caller can create another instrument.
    pub fn close(&self) {
        let instruments = self.instruments.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(instruments = instruments.len(), "Instrument registry closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for InstrumentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentRegistry")
            .field("instruments", &self.len())
            .field("created", &self.created())
            .field("closed", &self.is_closed())
            .finish()
    }
}
