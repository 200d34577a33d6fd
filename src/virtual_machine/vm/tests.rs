use super::*;
use crate::utils::test_utils::utils::{program, run_to_halt, run_with};
use crate::virtual_machine::vm::signal::{SignalSearch, search_signal_seed};

fn reg(name: char) -> Register {
    Register::new(name).expect("valid register")
}

fn get(regs: &RegisterFile, name: char) -> i64 {
    regs.get(reg(name))
}

fn run_and_get(source: &str, name: char) -> i64 {
    get(&run_to_halt(source), name)
}

fn run_expect_err(source: &str, config: MachineConfig) -> VMError {
    Machine::with_config(program(source), config)
        .run()
        .expect_err("expected error")
}

fn alternating(target: usize) -> MachineConfig {
    MachineConfig {
        output: OutputMode::Alternating { target },
        max_steps: Some(10_000),
    }
}

// ==================== Data movement / Arithmetic ====================

#[test]
fn set_literal_and_register() {
    let regs = run_to_halt("set a 42\nset b a\nset c -1");
    assert_eq!(get(&regs, 'a'), 42);
    assert_eq!(get(&regs, 'b'), 42);
    assert_eq!(get(&regs, 'c'), -1);
}

#[test]
fn unwritten_registers_read_zero() {
    assert_eq!(run_and_get("set a z", 'a'), 0);
}

#[test]
fn arithmetic_end_to_end() {
    assert_eq!(run_and_get("SET a 1\nADD a 2\nMUL a a\nMOD a 5", 'a'), 4);
}

#[test]
fn sub_and_negative_results() {
    assert_eq!(run_and_get("set a 3\nsub a 10", 'a'), -7);
}

#[test]
fn add_wrapping() {
    assert_eq!(run_and_get("set a 9223372036854775807\nadd a 1", 'a'), i64::MIN);
    assert_eq!(run_and_get("set a -9223372036854775808\ndec a", 'a'), i64::MAX);
}

#[test]
fn mul_wrapping() {
    assert_eq!(
        run_and_get("set a 4611686018427387904\nmul a 4", 'a'),
        0
    );
}

#[test]
fn modulo_takes_sign_of_dividend() {
    assert_eq!(run_and_get("set a -7\nmod a 3", 'a'), -1);
    assert_eq!(run_and_get("set a 7\nmod a -3", 'a'), 1);
    assert_eq!(run_and_get("set a -9223372036854775808\nmod a -1", 'a'), 0);
}

#[test]
fn modulo_by_zero() {
    let err = run_expect_err("set a 5\nmod a b", MachineConfig::default());
    assert_eq!(err, VMError::DivisionByZero { pc: 1 });
}

#[test]
fn inc_dec() {
    assert_eq!(run_and_get("inc a\ninc a\ndec a\ninc a", 'a'), 2);
}

#[test]
fn initial_registers_are_used() {
    let regs = run_with("add a b", &[('a', 5), ('b', 6)]);
    assert_eq!(get(&regs, 'a'), 11);
}

// ==================== Control flow ====================

#[test]
fn copy_and_count_down() {
    let regs = run_to_halt(
        r#"
            cpy 41 a
            inc a
            inc a
            dec a
            jnz a 2
            dec a
        "#,
    );
    assert_eq!(get(&regs, 'a'), 42);
}

#[test]
fn loop_with_jnz() {
    let regs = run_to_halt(
        r#"
            set b 5
            add a 3      # a += 3, five times
            dec b
            jnz b -2
        "#,
    );
    assert_eq!(get(&regs, 'a'), 15);
    assert_eq!(get(&regs, 'b'), 0);
}

#[test]
fn jnz_with_zero_condition_only_advances() {
    for offset in [i64::MIN, -5, -1, 0, 1, 2, 7, i64::MAX] {
        let literal = format!("jnz 0 {offset}\ninc b");
        assert_eq!(run_and_get(&literal, 'b'), 1, "literal offset {offset}");

        let via_register = format!("set c {offset}\njnz a c\ninc b");
        assert_eq!(run_and_get(&via_register, 'b'), 1, "register offset {offset}");
    }
}

#[test]
fn jnz_backwards_out_of_program_halts() {
    let mut machine = Machine::new(program("inc a\njnz 1 -5\ninc a"));
    assert_eq!(machine.run().unwrap(), Outcome::Halted(*machine.registers()));
    assert_eq!(machine.pc(), -4);
    assert!(machine.is_halted());
    assert_eq!(get(machine.registers(), 'a'), 1);
}

#[test]
fn jgz_takes_only_positive_conditions() {
    assert_eq!(run_and_get("set a -1\njgz a 2\ninc b", 'b'), 1);
    assert_eq!(run_and_get("jgz a 2\ninc b", 'b'), 1);
    assert_eq!(run_and_get("set a 3\njgz a 2\ninc b", 'b'), 0);
}

#[test]
fn empty_program_halts_immediately() {
    let mut machine = Machine::new(Program::default());
    assert_eq!(machine.step().unwrap(), Step::Halted);
    assert_eq!(machine.stats().steps(), 0);
}

#[test]
fn straight_line_programs_are_deterministic() {
    let sources = [
        "set a 1\nadd a 2\nmul a a\nmod a 5",
        "set b 7\nset c 3\nsub b 1\nmul c 2\ninc d\njnz b -3",
        "cpy 12 a\ndec a\nmul c 3\nadd c a\nmod c 1000\njnz a -4",
    ];
    for source in sources {
        let initial = [('a', 3), ('d', -2)];
        assert_eq!(run_with(source, &initial), run_with(source, &initial), "{source}");
    }
}

#[test]
fn step_limit_exceeded() {
    let config = MachineConfig {
        max_steps: Some(100),
        ..MachineConfig::default()
    };
    let err = run_expect_err("inc a\njnz 1 -1", config);
    assert_eq!(err, VMError::StepLimitExceeded { limit: 100 });
}

#[test]
fn step_limit_not_hit_on_halt() {
    let config = MachineConfig {
        max_steps: Some(4),
        ..MachineConfig::default()
    };
    let mut machine = Machine::with_config(program("inc a\ninc a\ninc a\ninc a"), config);
    assert!(matches!(machine.run(), Ok(Outcome::Halted(_))));
}

// ==================== Toggle ====================

#[test]
fn toggle_program() {
    let mut machine = Machine::new(program(
        r#"
            cpy 2 a
            tgl a
            tgl a
            tgl a
            cpy 1 a
            dec a
            dec a
        "#,
    ));
    let Outcome::Halted(regs) = machine.run().unwrap() else {
        panic!("expected halt");
    };
    assert_eq!(get(&regs, 'a'), 3);
    assert_eq!(machine.program().fetch(3).unwrap().opcode(), Opcode::Inc);
    assert_eq!(machine.program().fetch(4).unwrap().opcode(), Opcode::Jnz);
}

#[test]
fn toggle_out_of_range_is_a_no_op() {
    let source = "INC a\nTGL a";
    let mut machine = Machine::new(program(source)).with_register(reg('a'), 1);
    let outcome = machine.run().unwrap();
    assert_eq!(get(machine.registers(), 'a'), 2);
    assert_eq!(machine.program(), &program(source));
    assert_eq!(machine.pc(), 2);
    assert!(matches!(outcome, Outcome::Halted(_)));
}

#[test]
fn toggle_affects_only_future_fetches() {
    let regs = run_to_halt("set a 2\ntgl a\ninc b\ninc b");
    assert_eq!(get(&regs, 'b'), 0);

    let mut machine = Machine::new(program("inc b\ntgl -1"));
    machine.run().unwrap();
    assert_eq!(get(machine.registers(), 'b'), 1);
    assert_eq!(machine.program().fetch(0).unwrap().opcode(), Opcode::Dec);
}

#[test]
fn tgl_can_toggle_itself() {
    let mut machine = Machine::new(program("tgl 0"));
    machine.run().unwrap();
    assert_eq!(machine.program().fetch(0).unwrap().opcode(), Opcode::Inc);
}

#[test]
fn toggled_literal_destination_is_skipped() {
    // jnz 1 5 toggles into SET 5, 1
    let mut machine = Machine::new(program("tgl 1\njnz 1 5\ninc a"));
    machine.run().unwrap();
    assert_eq!(get(machine.registers(), 'a'), 1);
    assert_eq!(machine.stats().skipped(), 1);
    assert_eq!(machine.stats().steps(), 3);
}

#[test]
fn toggling_is_local_to_each_machine() {
    let shared = program("tgl 1\ninc a");
    let mut first = Machine::new(shared.clone());
    first.run().unwrap();
    let mut second = Machine::new(shared.clone());
    second.run().unwrap();
    assert_eq!(get(first.registers(), 'a'), -1);
    assert_eq!(get(second.registers(), 'a'), -1);
    assert_eq!(shared.fetch(1).unwrap().opcode(), Opcode::Inc);
}

// ==================== Statistics ====================

#[test]
fn per_opcode_counts() {
    let mut machine = Machine::new(program(
        r#"
            set b 3
            set c 1
            mul c b
            sub b 1
            jnz b -2
        "#,
    ));
    machine.run().unwrap();
    let stats = machine.stats();
    assert_eq!(stats.count(Opcode::Mul), 3);
    assert_eq!(stats.count(Opcode::Jnz), 3);
    assert_eq!(stats.count(Opcode::Set), 2);
    assert_eq!(stats.count(Opcode::Tgl), 0);
    assert_eq!(stats.steps(), 11);
    assert_eq!(stats.iter().map(|(_, n)| n).sum::<u64>(), stats.steps());
    assert_eq!(get(machine.registers(), 'c'), 6);
}

// ==================== Output ====================

#[test]
fn trace_mode_records_outputs() {
    let mut machine = Machine::new(program("out 3\nout a\nset a 9\nout a"));
    assert!(matches!(machine.run().unwrap(), Outcome::Halted(_)));
    assert_eq!(machine.outputs(), &[3, 0, 9]);
}

#[test]
fn alternating_signal_reaches_target() {
    let mut machine = Machine::with_config(program("out 0\nout 1\njnz 1 -2"), alternating(6));
    assert_eq!(machine.run().unwrap(), Outcome::Signal(vec![0, 1, 0, 1, 0, 1]));
}

#[test]
fn alternating_signal_must_start_at_zero() {
    let outcome = Machine::with_config(program("out 1\nout 0\njnz 1 -2"), alternating(4))
        .run()
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::OutputViolation {
            value: 1,
            trace: vec![]
        }
    );
}

#[test]
fn alternating_signal_violation_keeps_valid_prefix() {
    let outcome = Machine::with_config(program("out 0\nout 1\nout 1"), alternating(10))
        .run()
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::OutputViolation {
            value: 1,
            trace: vec![0, 1]
        }
    );
}

#[test]
fn alternating_signal_rejects_values_other_than_zero_and_one() {
    let outcome = Machine::with_config(program("out 0\nout 2\nout 0"), alternating(10))
        .run()
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::OutputViolation {
            value: 2,
            trace: vec![0]
        }
    );
}

#[test]
fn alternating_signal_halting_early_reports_halt() {
    let outcome = Machine::with_config(program("out 0\nout 1"), alternating(10))
        .run()
        .unwrap();
    assert!(matches!(outcome, Outcome::Halted(_)));
}

/// Emits `a - 3` then `a - 2`, repeating; only a = 3 yields 0, 1, 0, 1, ...
const SEEDED_SIGNAL: &str = r#"
    set b a
    sub b 3
    out b
    inc b
    out b
    dec b
    jnz 1 -4
"#;

#[test]
fn signal_search_finds_lowest_seed() {
    let search = SignalSearch {
        registers: RegisterFile::new(),
        register: reg('a'),
        seeds: 0..100,
        target: 20,
        max_steps: Some(10_000),
    };
    assert_eq!(search_signal_seed(&program(SEEDED_SIGNAL), &search), Ok(Some(3)));
}

#[test]
fn signal_search_exhausts_range() {
    let search = SignalSearch {
        registers: RegisterFile::new(),
        register: reg('a'),
        seeds: 0..3,
        target: 20,
        max_steps: Some(10_000),
    };
    assert_eq!(search_signal_seed(&program(SEEDED_SIGNAL), &search), Ok(None));
}

#[test]
fn signal_search_skips_runaway_seeds() {
    // Seed 0 loops forever without output; seed 1 emits the signal.
    let source = "jnz a 2\njnz 1 0\nout 0\nout 1\njnz 1 -2";
    let search = SignalSearch {
        registers: RegisterFile::new(),
        register: reg('a'),
        seeds: 0..5,
        target: 8,
        max_steps: Some(1_000),
    };
    assert_eq!(search_signal_seed(&program(source), &search), Ok(Some(1)));
}

#[test]
fn signal_search_starts_from_base_registers() {
    // Outputs x - 1 then x, repeating; x = 1 gives the signal for every seed.
    let source = "set b x\nsub b 1\nout b\nout x\njnz 1 -2";
    let mut search = SignalSearch {
        registers: RegisterFile::new(),
        register: reg('a'),
        seeds: 0..3,
        target: 6,
        max_steps: Some(1_000),
    };
    assert_eq!(search_signal_seed(&program(source), &search), Ok(None));

    search.registers = RegisterFile::from_pairs([('x', 1)]).unwrap();
    assert_eq!(search_signal_seed(&program(source), &search), Ok(Some(0)));
}

#[test]
fn signal_search_propagates_real_errors() {
    let search = SignalSearch {
        registers: RegisterFile::new(),
        register: reg('a'),
        seeds: 0..5,
        target: 8,
        max_steps: None,
    };
    assert_eq!(
        search_signal_seed(&program("mod a b"), &search),
        Err(VMError::DivisionByZero { pc: 0 })
    );
}

// ==================== Send / Receive ====================

#[test]
fn run_blocks_on_receive() {
    let mut machine = Machine::new(program("snd 4\nrcv a\ninc a"));
    assert_eq!(machine.run().unwrap(), Outcome::Blocked { pc: 1 });
    assert_eq!(machine.last_sent(), Some(4));
}

#[test]
fn step_reports_send_and_receive() {
    let mut machine = Machine::new(program("snd 7\nrcv b\nadd b 1"));
    assert_eq!(machine.step().unwrap(), Step::Send(7));
    assert_eq!(machine.step().unwrap(), Step::Receive(reg('b')));
    // Stays suspended until delivered.
    assert_eq!(machine.step().unwrap(), Step::Receive(reg('b')));
    assert_eq!(machine.stats().steps(), 2);

    machine.deliver(41).unwrap();
    assert_eq!(machine.step().unwrap(), Step::Executed);
    assert_eq!(machine.step().unwrap(), Step::Halted);
    assert_eq!(get(machine.registers(), 'b'), 42);
}

#[test]
fn deliver_without_pending_receive() {
    let mut machine = Machine::new(program("inc a"));
    assert_eq!(machine.deliver(1), Err(VMError::NoPendingReceive { pc: 0 }));
    assert_eq!(machine.skip_receive(), Err(VMError::NoPendingReceive { pc: 0 }));
}

#[test]
fn recover_returns_last_sound() {
    let mut machine = Machine::new(program(
        r#"
            set a 1
            add a 2
            mul a a
            mod a 5
            snd a
            set a 0
            rcv a
            jgz a -1
            set a 1
            jgz a -2
        "#,
    ));
    assert_eq!(machine.run_recover().unwrap(), Outcome::Recovered(4));
}

#[test]
fn recover_without_sound_yields_zero() {
    let mut machine = Machine::new(program("set a 1\nrcv a"));
    assert_eq!(machine.run_recover().unwrap(), Outcome::Recovered(0));
}

#[test]
fn recover_skips_zero_receive() {
    let mut machine = Machine::new(program("snd 5\nrcv a\ninc b"));
    assert!(matches!(machine.run_recover().unwrap(), Outcome::Halted(_)));
    assert_eq!(get(machine.registers(), 'b'), 1);
    assert_eq!(get(machine.registers(), 'a'), 0);
}
