//! A minimal VM-ASM interpreter, test-only support code (not part of the
//! crate: the VM itself is an out-of-scope external collaborator per
//! spec.md §1/§2 — this exists purely so the integration tests can check
//! that compiled programs behave as spec §8's end-to-end scenarios say a
//! real VM would run them, rather than asserting on instruction text alone).
//!
//! Implements exactly the instruction set spec.md §6 lists: `LOAD STORE
//! LOADI STOREI ADD SUB SET HALF GET PUT JUMP JPOS JZERO JNEG RTRN HALT`,
//! with `LOAD`/`STORE`/etc. reading and writing an implicit accumulator, and
//! jump operands already resolved to relative line offsets (`JUMP`/`JPOS`/
//! `JZERO`/`JNEG`) or, for `RTRN`, an absolute line number stored in memory.
//!
//! Address `0` aliases the accumulator itself rather than a real memory
//! cell (confirmed against `original_source/compiler/Node.hpp`'s
//! `TableNode::build`, which computes an absolute element address into the
//! accumulator and then issues a bare `LOADI 0`/`STOREI 0` to dereference
//! it) — `codegen`'s array-indexing emission relies on this.

use std::collections::HashMap;

pub struct Vm {
    program: Vec<(String, Option<i64>)>,
    mem: HashMap<i64, i64>,
    acc: i64,
    pc: i64,
    input: std::collections::VecDeque<i64>,
    pub output: Vec<i64>,
}

impl Vm {
    pub fn new(asm: &str, input: Vec<i64>) -> Self {
        let program = asm
            .lines()
            .map(|line| {
                let mut parts = line.splitn(2, ' ');
                let op = parts.next().unwrap().to_string();
                let operand = parts.next().and_then(|s| s.parse::<i64>().ok());
                (op, operand)
            })
            .collect();
        Vm {
            program,
            mem: HashMap::new(),
            acc: 0,
            pc: 0,
            input: input.into(),
            output: Vec::new(),
        }
    }

    fn get(&self, addr: i64) -> i64 {
        if addr == 0 {
            self.acc
        } else {
            *self.mem.get(&addr).unwrap_or(&0)
        }
    }

    fn set(&mut self, addr: i64, value: i64) {
        if addr == 0 {
            self.acc = value;
        } else {
            self.mem.insert(addr, value);
        }
    }

    /// Run until `HALT`, panicking after an excessive number of steps (a
    /// miscompiled infinite loop should fail the test loudly, not hang it).
    pub fn run(&mut self) {
        for _ in 0..1_000_000 {
            let (op, operand) = self.program[self.pc as usize].clone();
            match op.as_str() {
                "HALT" => return,
                "LOAD" => {
                    self.acc = self.get(operand.unwrap());
                    self.pc += 1;
                }
                "STORE" => {
                    self.set(operand.unwrap(), self.acc);
                    self.pc += 1;
                }
                "LOADI" => {
                    let indirect = self.get(operand.unwrap());
                    self.acc = self.get(indirect);
                    self.pc += 1;
                }
                "STOREI" => {
                    let indirect = self.get(operand.unwrap());
                    self.set(indirect, self.acc);
                    self.pc += 1;
                }
                "ADD" => {
                    self.acc += self.get(operand.unwrap());
                    self.pc += 1;
                }
                "SUB" => {
                    self.acc -= self.get(operand.unwrap());
                    self.pc += 1;
                }
                "SET" => {
                    self.acc = operand.unwrap();
                    self.pc += 1;
                }
                "HALF" => {
                    self.acc = self.acc.div_euclid(2);
                    self.pc += 1;
                }
                "GET" => {
                    let value = self.input.pop_front().expect("VM ran out of input");
                    self.set(operand.unwrap(), value);
                    self.pc += 1;
                }
                "PUT" => {
                    self.output.push(self.get(operand.unwrap()));
                    self.pc += 1;
                }
                "JUMP" => self.pc += operand.unwrap(),
                "JPOS" => {
                    if self.acc > 0 {
                        self.pc += operand.unwrap();
                    } else {
                        self.pc += 1;
                    }
                }
                "JZERO" => {
                    if self.acc == 0 {
                        self.pc += operand.unwrap();
                    } else {
                        self.pc += 1;
                    }
                }
                "JNEG" => {
                    if self.acc < 0 {
                        self.pc += operand.unwrap();
                    } else {
                        self.pc += 1;
                    }
                }
                "RTRN" => self.pc = self.get(operand.unwrap()),
                other => panic!("unknown VM-ASM opcode: {other}"),
            }
        }
        panic!("VM exceeded step budget without halting");
    }
}

/// Compile `source`, run it on the test VM with `input`, and return whatever
/// it `PUT`.
pub fn run(source: &str, input: Vec<i64>) -> Vec<i64> {
    let asm = impc::compile(source).unwrap_or_else(|err| {
        panic!("compile errors: {err:?}");
    });
    let mut vm = Vm::new(&asm, input);
    vm.run();
    vm.output
}
