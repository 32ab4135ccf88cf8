use wasmtime::component::ResourceTable;
use wasmtime_wasi::{WasiCtx, WasiCtxBuilder, WasiCtxView, WasiView};

/// Per-instance WASI state.
///
/// Deny-default sandbox: no filesystem preopens and no host environment
/// variables. stdout/stderr are inherited so component diagnostics stay
/// visible on the host.
pub struct WasiState {
    ctx: WasiCtx,
    table: ResourceTable,
}

impl WasiView for WasiState {
    fn ctx(&mut self) -> WasiCtxView<'_> {
        WasiCtxView {
            ctx: &mut self.ctx,
            table: &mut self.table,
        }
    }
}

impl WasiState {
    pub fn new() -> Self {
        let ctx = WasiCtxBuilder::new()
            .inherit_stdout()
            .inherit_stderr()
            .build();
        Self {
            ctx,
            table: ResourceTable::new(),
        }
    }
}

impl Default for WasiState {
    fn default() -> Self {
        Self::new()
    }
}
