//! Runs assembled `.TEST` units against the embedded CPU emulator and reports pass/fail,
//! optionally as TAP v14. Grounded in `tests.c`'s `test_run`: per-unit deterministic register
//! seeding, a step loop that watches for control flow wandering into unassembled memory, and
//! check-bit-triggered assertion evaluation.

use crate::assert;
use crate::cpu::{Cpu, Fault, MemProtBit, Memory, MEM_SIZE};

/// One compiled `.ASSERT`, anchored to the address it fires at.
#[derive(Debug, Clone)]
pub struct Assertion {
    pub addr: u16,
    pub program: assert::Program,
}

/// One `.TEST name ... .ENDTST` block.
#[derive(Debug, Clone)]
pub struct TestUnit {
    pub name: String,
    pub entry: u16,
}

/// The assembled memory image plus every test unit and assertion the source defined.
pub struct TestContext {
    pub memory: Memory,
    pub asserts: Vec<Assertion>,
    pub units: Vec<TestUnit>,
}

/// Stack-pointer seed for the first unit; each subsequent unit's `S` is derived from this so
/// every unit gets a distinct, reproducible stack location without sharing state.
const STACK_SEED: u16 = 0xFEFE;

impl TestContext {
    /// An empty context: a memory image of all zero, entirely unprotected.
    pub fn new() -> Self {
        Self {
            memory: Memory::new(0),
            asserts: Vec::new(),
            units: Vec::new(),
        }
    }

    /// Record assembled bytes as live, readable, writable, executable memory.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let a = addr.wrapping_add(i as u16) as usize;
            self.memory.bytes[a] = b;
            self.memory.prot[a] = MemProtBit::Read | MemProtBit::Write | MemProtBit::Exec;
        }
    }

    /// Mark `[start, end]` as traced (`.TRON`/`.TROFF`).
    pub fn mark_tron(&mut self, start: u16, end: u16) {
        let mut a = start;
        loop {
            self.memory.prot[a as usize] |= MemProtBit::Tron;
            if a == end {
                break;
            }
            a = a.wrapping_add(1);
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one unit's run.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// Every assertion along the path held, and control returned cleanly.
    Passed,
    /// An `.ASSERT` evaluated false; carries its message, if any.
    AssertFailed(Option<String>),
    /// The CPU faulted before reaching a clean return.
    Faulted(Fault),
}

/// One unit's name, source address, and outcome.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub name: String,
    pub outcome: UnitOutcome,
}

/// A full register-file and memory snapshot, written to a `-c` corefile after the last unit in
/// a run finishes (whether it passed, failed, or faulted).
#[derive(Debug, Clone)]
pub struct CoreDump {
    pub cpu: Cpu,
    pub memory: Box<[u8; MEM_SIZE]>,
}

/// The whole run: per-unit results plus a TAP-ready summary.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub results: Vec<UnitResult>,
    /// Populated with the final unit's CPU/memory state, for `-c`.
    pub core: Option<CoreDump>,
}

impl TestReport {
    /// Whether every unit passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.outcome == UnitOutcome::Passed)
    }

    /// Render as TAP version 14.
    pub fn to_tap(&self) -> String {
        let mut out = String::new();
        out.push_str("TAP version 14\n");
        out.push_str(&format!("1..{}\n", self.results.len()));
        for (i, r) in self.results.iter().enumerate() {
            let n = i + 1;
            match &r.outcome {
                UnitOutcome::Passed => out.push_str(&format!("ok {n} - {}\n", r.name)),
                UnitOutcome::AssertFailed(msg) => {
                    out.push_str(&format!("not ok {n} - {}\n", r.name));
                    if let Some(m) = msg {
                        out.push_str(&format!("# {m}\n"));
                    }
                }
                UnitOutcome::Faulted(f) => {
                    out.push_str(&format!("not ok {n} - {} # {}\n", r.name, fault_message(*f)));
                }
            }
        }
        out
    }

    /// Render as plain pass/fail text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for r in &self.results {
            match &r.outcome {
                UnitOutcome::Passed => out.push_str(&format!("PASS {}\n", r.name)),
                UnitOutcome::AssertFailed(msg) => {
                    out.push_str(&format!("FAIL {}: assertion failed{}\n", r.name, msg.as_deref().map(|m| format!(" - {m}")).unwrap_or_default()));
                }
                UnitOutcome::Faulted(f) => out.push_str(&format!("FAIL {}: {}\n", r.name, fault_message(*f))),
            }
        }
        out
    }
}

fn fault_message(f: Fault) -> &'static str {
    match f {
        Fault::Internal => "internal emulator error",
        Fault::IllegalInstruction => "illegal instruction",
        Fault::IllegalAddressingMode => "illegal addressing mode",
        Fault::IllegalExchange => "illegal EXG register pair",
        Fault::IllegalTransfer => "illegal TFR register pair",
        Fault::TestFailed => "SWI reached with no handler installed",
        Fault::NonReadMem => "read from protected memory",
        Fault::Weeds => "control reached unassembled memory",
        Fault::NonWriteMem => "write to protected memory",
    }
}

/// Bytes of stack reserved below each unit's top-of-stack and pre-granted Read+Write, mirroring
/// the fixed-size stack window the original test harness carves out below its `sp`.
const TEST_STACK_SIZE: u16 = 256;

/// Seeds registers for one unit and returns its top-of-stack (the `S` value a unit is considered
/// to have "returned" to once its own pushes/pops unwind). `S` itself starts two bytes below that,
/// leaving room for the implicit return address `RTS` pops to reach it.
fn seed_registers(cpu: &mut Cpu, entry: u16, index: u16) -> u16 {
    cpu.pc = entry;
    let top = STACK_SEED.wrapping_sub(index.wrapping_mul(2));
    cpu.s = top.wrapping_sub(2);
    cpu.u = cpu.pc ^ cpu.s;
    cpu.y = cpu.u;
    cpu.x = cpu.y;
    cpu.set_d(cpu.x);
    cpu.dp = 0;
    cpu.cc = 0;
    top
}

/// Grants Read+Write over the `TEST_STACK_SIZE` bytes at and below `top`, so a unit's own
/// push/pop traffic (including the implicit `RTS` that ends it) doesn't fault against memory
/// that otherwise defaults to no permissions at all.
fn reserve_stack(memory: &mut Memory, top: u16) {
    let start = top.wrapping_sub(TEST_STACK_SIZE - 1);
    memory.protect(start, TEST_STACK_SIZE, MemProtBit::Read | MemProtBit::Write);
}

const MAX_STEPS: u32 = 1_000_000;

fn run_unit(ctx: &TestContext, unit: &TestUnit, index: u16) -> (UnitOutcome, Cpu, Memory) {
    let mut memory = Memory::new(ctx.memory.fill);
    memory.bytes = ctx.memory.bytes.clone();
    memory.prot = ctx.memory.prot.clone();

    let mut cpu = Cpu::new();
    let stack_top = seed_registers(&mut cpu, unit.entry, index);
    reserve_stack(&mut memory, stack_top);

    for _ in 0..MAX_STEPS {
        if memory.bytes[cpu.pc as usize] == memory.fill && !memory.prot[cpu.pc as usize].contains(MemProtBit::Exec) {
            return (UnitOutcome::Faulted(Fault::Weeds), cpu, memory);
        }
        if let Err(fault) = cpu.step(&mut memory) {
            return (UnitOutcome::Faulted(fault), cpu, memory);
        }
        for a in &ctx.asserts {
            if a.addr == cpu.pc {
                match assert::run(&a.program, &cpu, &mut memory) {
                    Ok(true) => {}
                    Ok(false) => return (UnitOutcome::AssertFailed(a.program.message.clone()), cpu, memory),
                    Err(fault) => return (UnitOutcome::Faulted(fault), cpu, memory),
                }
            }
        }
        if cpu.s == stack_top {
            return (UnitOutcome::Passed, cpu, memory);
        }
    }
    (UnitOutcome::Faulted(Fault::Weeds), cpu, memory)
}

/// Fisher-Yates shuffle, deterministic given `seed` (no `rand::thread_rng` — the harness asks
/// for reproducible `-r` runs, not cryptographic randomness).
fn shuffled_order(n: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    let mut state = seed.wrapping_add(0x9E3779B97F4A7C15);
    for i in (1..n).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state as usize) % (i + 1);
        order.swap(i, j);
    }
    order
}

/// Run every `.TEST` unit in `ctx`, optionally in shuffled order, and collect the results.
pub fn run_all(ctx: &TestContext, shuffle: bool) -> TestReport {
    let order = if shuffle {
        shuffled_order(ctx.units.len(), ctx.units.len() as u64)
    } else {
        (0..ctx.units.len()).collect()
    };
    let mut core = None;
    let results = order
        .into_iter()
        .map(|i| {
            let unit = &ctx.units[i];
            let (outcome, cpu, memory) = run_unit(ctx, unit, i as u16);
            core = Some(CoreDump {
                cpu,
                memory: memory.bytes,
            });
            UnitResult {
                name: unit.name.clone(),
                outcome,
            }
        })
        .collect();
    TestReport { results, core }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_unit_that_rts_immediately_passes() {
        let mut ctx = TestContext::new();
        ctx.load(0x1000, &[0x39]); // RTS
        ctx.units.push(TestUnit { name: "rts".to_string(), entry: 0x1000 });
        let report = run_all(&ctx, false);
        assert_eq!(report.results[0].outcome, UnitOutcome::Passed);
    }

    #[test]
    fn a_unit_that_pushes_and_pulls_before_returning_passes() {
        let mut ctx = TestContext::new();
        ctx.load(0x1000, &[0x34, 0x02, 0x35, 0x02, 0x39]); // PSHS A ; PULS A ; RTS
        ctx.units.push(TestUnit { name: "pshs".to_string(), entry: 0x1000 });
        let report = run_all(&ctx, false);
        assert_eq!(report.results[0].outcome, UnitOutcome::Passed);
    }

    #[test]
    fn control_reaching_unassembled_memory_is_weeds() {
        let mut ctx = TestContext::new();
        ctx.load(0x1000, &[0x20, 0x10]); // BRA $1012, well past anything loaded
        ctx.units.push(TestUnit { name: "weeds".to_string(), entry: 0x1000 });
        let report = run_all(&ctx, false);
        assert_eq!(report.results[0].outcome, UnitOutcome::Faulted(Fault::Weeds));
    }

    #[test]
    fn failing_assertion_is_reported_with_its_message() {
        let mut ctx = TestContext::new();
        ctx.load(0x1000, &[0x86, 0x01, 0x39]); // LDA #1 ; RTS
        let mut buf = crate::buffer::LineBuffer::new();
        buf.load("/a=2, \"a should be two\"", crate::diag::SourceLoc::none()).unwrap();
        let program = assert::compile(&mut buf, &crate::diag::SourceLoc::none()).unwrap();
        ctx.asserts.push(Assertion { addr: 0x1002, program });
        ctx.units.push(TestUnit { name: "assert".to_string(), entry: 0x1000 });
        let report = run_all(&ctx, false);
        assert_eq!(report.results[0].outcome, UnitOutcome::AssertFailed(Some("a should be two".to_string())));
    }

    #[test]
    fn tap_output_has_version_and_plan_lines() {
        let mut ctx = TestContext::new();
        ctx.load(0x1000, &[0x39]);
        ctx.units.push(TestUnit { name: "rts".to_string(), entry: 0x1000 });
        let report = run_all(&ctx, false);
        let tap = report.to_tap();
        assert!(tap.starts_with("TAP version 14\n1..1\n"));
        assert!(tap.contains("ok 1 - rts"));
    }
}
