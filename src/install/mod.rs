// This module implements the installation handshake between a compiler and
// the code cache that owns executable memory. A finished compilation is
// packaged as a CompiledCode blob - machine code plus the per-offset
// DebugInfo table - and handed to a CodeCacheProvider, which answers with an
// InstalledCode handle. The handle outlives the installation call: the cache
// side rebinds or clears its address and entry point as code is replaced,
// invalidated or reclaimed, while compiler and runtime threads read it
// concurrently. Those fields are therefore atomics with single-writer
// discipline on the cache side; readers may observe stale values and must
// re-check validity at the point of use instead of caching it. Installation
// failures are Bailouts carrying a permanent flag so the driver can tell
// "retrying is pointless" (blob over the cache's size limit) from "retry may
// succeed" (cache momentarily full). SimpleCodeCache is an in-process
// provider used by the test suite and by embedders that have no VM attached.

//! Code installation protocol and installed-code handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use log::{debug, trace};

use crate::core::error::{Bailout, CodeError, CodeResult};
use crate::core::meta::MethodHandle;
use crate::deopt::DebugInfo;

/// Opaque per-compilation speculation-log token.
///
/// Created by the code-cache provider and threaded through installation;
/// this crate never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpeculationLog(pub u64);

/// Runtime handle to a piece of installed machine code.
///
/// The cache side is the single writer of the atomic fields; any thread may
/// read them. Reads may be stale, so validity must be re-checked before
/// every use and never cached across a safepoint.
///
/// Lifecycle: created unbound (invalid, dead), bound to a live entry point
/// by the cache (valid), possibly invalidated (entry point cleared, existing
/// activations deoptimize), and finally dead once the underlying memory is
/// reclaimed. Invalidation and death are independent: invalid code can stay
/// alive while activations drain.
#[derive(Debug)]
pub struct InstalledCode {
    name: String,
    address: AtomicU64,
    entry_point: AtomicU64,
    /// Bumped by the cache on every (re)bind of the entry point.
    version: AtomicU64,
}

impl InstalledCode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: AtomicU64::new(0),
            entry_point: AtomicU64::new(0),
            version: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start address of the installed blob; zero when dead.
    pub fn address(&self) -> u64 {
        self.address.load(Ordering::Acquire)
    }

    pub fn entry_point(&self) -> u64 {
        self.entry_point.load(Ordering::Acquire)
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Whether the code may currently be entered.
    pub fn is_valid(&self) -> bool {
        self.entry_point() != 0
    }

    /// Whether the underlying memory is still mapped.
    pub fn is_alive(&self) -> bool {
        self.address() != 0
    }

    /// Entry point for an execution attempt, or the invalid-code signal.
    pub fn executable_entry(&self) -> CodeResult<u64> {
        let entry = self.entry_point();
        if entry == 0 {
            return Err(CodeError::InvalidInstalledCode {
                name: self.name.clone(),
            });
        }
        Ok(entry)
    }

    /// Clear the entry point. Idempotent; the address stays bound until the
    /// cache reclaims the memory.
    pub fn invalidate(&self) {
        self.entry_point.store(0, Ordering::Release);
    }

    /// Cache side only: (re)bind the handle to a blob and bump the version.
    pub(crate) fn bind(&self, address: u64, entry_point: u64) {
        self.address.store(address, Ordering::Release);
        self.entry_point.store(entry_point, Ordering::Release);
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Cache side only: the underlying memory has been reclaimed.
    pub(crate) fn release(&self) {
        self.invalidate();
        self.address.store(0, Ordering::Release);
    }
}

impl fmt::Display for InstalledCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[v{}, {}]",
            self.name,
            self.version(),
            if self.is_valid() {
                "valid"
            } else if self.is_alive() {
                "invalid"
            } else {
                "dead"
            }
        )
    }
}

/// A finished compilation, ready to hand to a [`CodeCacheProvider`].
#[derive(Debug, Clone)]
pub struct CompiledCode {
    pub name: String,
    /// The method this blob implements; `None` for stubs.
    pub target_method: Option<MethodHandle>,
    pub code: Vec<u8>,
    /// Deoptimization metadata keyed by code offset, ascending.
    pub debug_infos: Vec<(usize, DebugInfo)>,
    pub total_frame_size: i32,
}

impl CompiledCode {
    /// # Panics
    /// Panics when a debug-info offset lies outside the code or the table
    /// is not in ascending offset order.
    pub fn new(
        name: impl Into<String>,
        target_method: Option<MethodHandle>,
        code: Vec<u8>,
        debug_infos: Vec<(usize, DebugInfo)>,
        total_frame_size: i32,
    ) -> Self {
        let mut previous = None;
        for &(offset, _) in &debug_infos {
            assert!(
                offset <= code.len(),
                "debug info at offset {} past code end {}",
                offset,
                code.len()
            );
            assert!(
                previous.map_or(true, |p| p < offset),
                "debug info table not in ascending offset order at {offset}"
            );
            previous = Some(offset);
        }
        Self {
            name: name.into(),
            target_method,
            code,
            debug_infos,
            total_frame_size,
        }
    }

    /// Metadata recorded exactly at `pc_offset`, if any.
    pub fn debug_info_at(&self, pc_offset: usize) -> Option<&DebugInfo> {
        self.debug_infos
            .binary_search_by_key(&pc_offset, |&(offset, _)| offset)
            .ok()
            .map(|i| &self.debug_infos[i].1)
    }
}

/// The code cache this crate's metadata is installed into.
///
/// The provider is the sole authority for validity and liveness
/// transitions on the handles it returns.
pub trait CodeCacheProvider {
    /// Install `code`, returning its handle. With `is_default` the blob
    /// becomes the target method's standard entry, replacing (and rebinding
    /// the handle of) any previous default.
    ///
    /// Rejection is a [`Bailout`]: permanent when retrying is pointless,
    /// transient when the cache was momentarily out of space.
    fn install_code(
        &mut self,
        code: &CompiledCode,
        log: Option<SpeculationLog>,
        is_default: bool,
    ) -> Result<Arc<InstalledCode>, Bailout>;

    /// Install without touching the method's default entry.
    fn add_code(
        &mut self,
        code: &CompiledCode,
        log: Option<SpeculationLog>,
    ) -> Result<Arc<InstalledCode>, Bailout> {
        self.install_code(code, log, false)
    }

    /// Install as the method's default entry.
    fn set_default_code(
        &mut self,
        code: &CompiledCode,
        log: Option<SpeculationLog>,
    ) -> Result<Arc<InstalledCode>, Bailout> {
        self.install_code(code, log, true)
    }

    /// Postcondition: any subsequent execution attempt through `code`
    /// observes the invalid-code signal, and running activations are
    /// scheduled for deoptimization. Fails with [`CodeError::Unsupported`]
    /// for handles this cache does not manage.
    fn invalidate_installed_code(&mut self, code: &InstalledCode) -> CodeResult<()>;
}

/// In-process provider with a default-entry table and a byte budget.
///
/// Addresses are simulated; there is no executable memory behind them.
pub struct SimpleCodeCache {
    /// Largest single blob the cache accepts; bigger is a permanent bailout.
    max_code_size: usize,
    /// Total byte budget; exhaustion is a transient bailout.
    capacity: usize,
    used: usize,
    defaults: HashMap<MethodHandle, Arc<InstalledCode>>,
    /// Every handle this cache has ever returned, default or not.
    issued: Vec<Arc<InstalledCode>>,
    next_address: u64,
}

impl SimpleCodeCache {
    const BASE_ADDRESS: u64 = 0x7f00_0000_0000;

    pub fn new(max_code_size: usize, capacity: usize) -> Self {
        assert!(
            max_code_size <= capacity,
            "blob limit {max_code_size} exceeds cache capacity {capacity}"
        );
        Self {
            max_code_size,
            capacity,
            used: 0,
            defaults: HashMap::new(),
            issued: Vec::new(),
            next_address: Self::BASE_ADDRESS,
        }
    }

    /// The current default entry for `method`, if one is installed.
    pub fn default_code(&self, method: &MethodHandle) -> Option<&Arc<InstalledCode>> {
        self.defaults.get(method)
    }

    pub fn used_bytes(&self) -> usize {
        self.used
    }

    fn allocate(&mut self, size: usize) -> Result<u64, Bailout> {
        if size > self.max_code_size {
            return Err(Bailout::permanent(format!(
                "code size {size} exceeds cache limit {}",
                self.max_code_size
            )));
        }
        if self.used + size > self.capacity {
            return Err(Bailout::transient(format!(
                "code cache full: {} of {} bytes used",
                self.used, self.capacity
            )));
        }
        let address = self.next_address;
        self.next_address += (size as u64).next_multiple_of(64);
        self.used += size;
        Ok(address)
    }
}

impl CodeCacheProvider for SimpleCodeCache {
    fn install_code(
        &mut self,
        code: &CompiledCode,
        log: Option<SpeculationLog>,
        is_default: bool,
    ) -> Result<Arc<InstalledCode>, Bailout> {
        debug!(
            "installing {} ({} bytes, {} debug infos, default={}, log={:?})",
            code.name,
            code.code.len(),
            code.debug_infos.len(),
            is_default,
            log
        );
        let address = self.allocate(code.code.len())?;

        if is_default {
            if let Some(method) = &code.target_method {
                // Rebind the existing handle so outstanding references to
                // the method's default entry follow the replacement.
                if let Some(existing) = self.defaults.get(method) {
                    let existing = Arc::clone(existing);
                    trace!("rebinding default entry {existing} for {method}");
                    existing.bind(address, address);
                    return Ok(existing);
                }
                let handle = Arc::new(InstalledCode::new(code.name.clone()));
                handle.bind(address, address);
                self.defaults.insert(method.clone(), Arc::clone(&handle));
                self.issued.push(Arc::clone(&handle));
                return Ok(handle);
            }
        }
        let handle = Arc::new(InstalledCode::new(code.name.clone()));
        handle.bind(address, address);
        self.issued.push(Arc::clone(&handle));
        Ok(handle)
    }

    fn invalidate_installed_code(&mut self, code: &InstalledCode) -> CodeResult<()> {
        if !self.issued.iter().any(|h| std::ptr::eq(h.as_ref(), code)) {
            return Err(CodeError::Unsupported(
                "installed code was not issued by this cache",
            ));
        }
        trace!("invalidating {code}");
        code.invalidate();
        Ok(())
    }
}
