//! The VM sandbox seam (spec.md §4.5.1).
//!
//! The persist engine treats script execution as a pure function: it hands
//! the engine a cloned [`Snapshot`] and a gas budget, and only the engine's
//! own `commit()` call (performed internally, before returning) makes any
//! writes visible to the caller's snapshot. The ledger never inspects VM
//! internals; it only records the reported outcome for
//! `ApplicationExecuted` notifications (spec.md §6 "Outbound messages").
//!
//! The actual script interpreter is out of scope (spec.md §1 Non-goals); this
//! module only fixes the trait boundary, plus a [`NullEngine`] fallback that
//! lets `ledger-core` be built and tested end-to-end without one wired in.

use ledger_storage::Snapshot;
use ledger_types::prelude::Transaction;
use ledger_types::Fixed8;
use std::sync::Arc;

/// Terminal state of a single invocation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VmState {
    /// The script ran to completion without faulting.
    Halt,
    /// The script faulted; gas up to the fault point was still consumed,
    /// but no state changes beyond fee accounting are kept (spec.md §4.5.1).
    Fault,
}

/// The recorded outcome of one `InvocationTransaction`'s execution,
/// regardless of success (spec.md §4.5.1: "Record VM state, gas consumed,
/// result stack, and notifications regardless of success").
#[derive(Clone, PartialEq, Debug)]
pub struct ExecutionOutcome {
    /// Whether the script halted or faulted.
    pub state: VmState,
    /// Gas actually consumed, bounded by the transaction's gas budget.
    pub gas_consumed: Fixed8,
    /// Opaque notification events raised during execution, in emission order.
    pub notifications: Vec<String>,
}

/// The pure-function script engine boundary the persist engine calls for
/// every `Invocation` transaction.
pub trait ScriptEngine: Send + Sync {
    /// Executes `tx.script` against `sandbox` (a child snapshot of the
    /// block-level snapshot) with at most `gas_budget` gas. Implementations
    /// must call the child snapshot's `commit()` themselves before
    /// returning `Halt`, so a faulted execution's writes never reach the
    /// parent snapshot.
    fn execute(&self, sandbox: Arc<Snapshot>, tx: &Transaction, gas_budget: Fixed8) -> ExecutionOutcome;
}

/// A no-op engine: every invocation halts immediately, consumes no gas, and
/// commits no writes. Used where no real VM is wired in (unit tests, and
/// any deployment that genuinely carries no `Invocation` traffic).
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEngine;

impl ScriptEngine for NullEngine {
    fn execute(&self, sandbox: Arc<Snapshot>, _tx: &Transaction, _gas_budget: Fixed8) -> ExecutionOutcome {
        let _ = sandbox.commit();
        ExecutionOutcome {
            state: VmState::Halt,
            gas_consumed: Fixed8::ZERO,
            notifications: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_storage::redb_store::RedbStore;
    use ledger_storage::Store;
    use ledger_types::prelude::TransactionKind;

    #[test]
    fn null_engine_always_halts_without_consuming_gas() {
        let store: Arc<dyn Store> = Arc::new(RedbStore::open_in_memory().expect("open store"));
        let snapshot = Arc::new(Snapshot::new(store));
        let tx = Transaction {
            inputs: vec![],
            outputs: vec![],
            attributes: vec![],
            witnesses: vec![],
            network_fee: Fixed8::ZERO,
            system_fee: Fixed8::ZERO,
            kind: TransactionKind::Invocation {
                script: vec![1, 2, 3],
                gas: Fixed8::from_whole(1),
            },
        };
        let outcome = NullEngine.execute(snapshot, &tx, Fixed8::from_whole(1));
        assert_eq!(outcome.state, VmState::Halt);
        assert!(outcome.gas_consumed.is_zero());
    }
}
