use super::ast::{Expr, Program, Statement, Stmt};
use super::ir::{Instruction, ProgramIr};
use super::value::Value;
use super::{Result, ScriptError};

/// Lower a parsed program into IR.
pub fn build_ir(program: &Program) -> Result<ProgramIr> {
    let mut builder = Builder::default();
    builder.block(&program.body)?;
    Ok(ProgramIr {
        name: program.name.clone(),
        code: builder.code,
        lines: builder.lines,
    })
}

#[derive(Default)]
struct Builder {
    code: Vec<Instruction>,
    lines: Vec<usize>,
    line: usize,
    loops: Vec<LoopContext>,
}

struct LoopContext {
    continue_target: usize,
    breaks: Vec<usize>,
    // `for` loops keep an iterator alive that `break` has to drop.
    iterates: bool,
}

impl Builder {
    fn emit(&mut self, instruction: Instruction) -> usize {
        self.code.push(instruction);
        self.lines.push(self.line);
        self.code.len() - 1
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.code[at] {
            Instruction::Jump(slot)
            | Instruction::JumpIfFalse(slot)
            | Instruction::JumpIfFalseOrPop(slot)
            | Instruction::JumpIfTrueOrPop(slot)
            | Instruction::ForIter(slot) => *slot = target,
            _ => {}
        }
    }

    fn block(&mut self, body: &[Statement]) -> Result<()> {
        for statement in body {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> Result<()> {
        self.line = statement.line;
        match &statement.kind {
            Stmt::Expr(expr) => {
                self.expr(expr)?;
                self.emit(Instruction::Pop);
            }
            Stmt::Assign { target, value } => {
                self.expr(value)?;
                self.emit(Instruction::Store(target.clone()));
            }
            Stmt::Import(name) => {
                self.emit(Instruction::Import(name.clone()));
            }
            Stmt::Pass => {}
            Stmt::If {
                branches,
                otherwise,
            } => {
                let mut ends = Vec::new();
                for (condition, body) in branches {
                    self.expr(condition)?;
                    let skip = self.emit(Instruction::JumpIfFalse(0));
                    self.block(body)?;
                    ends.push(self.emit(Instruction::Jump(0)));
                    let next = self.here();
                    self.patch(skip, next);
                }
                if let Some(body) = otherwise {
                    self.block(body)?;
                }
                let end = self.here();
                for jump in ends {
                    self.patch(jump, end);
                }
            }
            Stmt::While { condition, body } => {
                let start = self.here();
                self.expr(condition)?;
                let exit = self.emit(Instruction::JumpIfFalse(0));
                self.loop_body(start, false, body)?;
                self.emit(Instruction::Jump(start));
                let end = self.here();
                self.patch(exit, end);
                self.finish_loop(end);
            }
            Stmt::For {
                target,
                iterable,
                body,
            } => {
                self.expr(iterable)?;
                self.emit(Instruction::GetIter);
                let start = self.emit(Instruction::ForIter(0));
                self.emit(Instruction::Store(target.clone()));
                self.loop_body(start, true, body)?;
                self.emit(Instruction::Jump(start));
                let end = self.here();
                self.patch(start, end);
                self.finish_loop(end);
            }
            Stmt::Break => {
                let iterates = self
                    .loops
                    .last()
                    .map(|ctx| ctx.iterates)
                    .ok_or_else(|| validation(statement.line, "'break' outside loop"))?;
                if iterates {
                    self.emit(Instruction::PopIter);
                }
                let jump = self.emit(Instruction::Jump(0));
                if let Some(ctx) = self.loops.last_mut() {
                    ctx.breaks.push(jump);
                }
            }
            Stmt::Continue => {
                let target = self
                    .loops
                    .last()
                    .map(|ctx| ctx.continue_target)
                    .ok_or_else(|| validation(statement.line, "'continue' not properly in loop"))?;
                self.emit(Instruction::Jump(target));
            }
        }
        Ok(())
    }

    fn loop_body(&mut self, continue_target: usize, iterates: bool, body: &[Statement]) -> Result<()> {
        self.loops.push(LoopContext {
            continue_target,
            breaks: Vec::new(),
            iterates,
        });
        self.block(body)
    }

    fn finish_loop(&mut self, end: usize) {
        if let Some(ctx) = self.loops.pop() {
            for jump in ctx.breaks {
                self.patch(jump, end);
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::None => {
                self.emit(Instruction::Const(Value::None));
            }
            Expr::Boolean(flag) => {
                self.emit(Instruction::Const(Value::Boolean(*flag)));
            }
            Expr::Integer(num) => {
                self.emit(Instruction::Const(Value::Integer(*num)));
            }
            Expr::Float(num) => {
                self.emit(Instruction::Const(Value::Float(*num)));
            }
            Expr::String(text) => {
                self.emit(Instruction::Const(Value::String(text.clone())));
            }
            Expr::Name(name) => {
                self.emit(Instruction::Load(name.clone()));
            }
            Expr::List(items) => {
                for item in items {
                    self.expr(item)?;
                }
                self.emit(Instruction::BuildList(items.len()));
            }
            Expr::Attribute { value, name } => {
                self.expr(value)?;
                self.emit(Instruction::LoadAttr(name.clone()));
            }
            Expr::Index { value, index } => {
                self.expr(value)?;
                self.expr(index)?;
                self.emit(Instruction::Index);
            }
            Expr::Call { callee, args } => {
                self.expr(callee)?;
                for arg in args {
                    self.expr(arg)?;
                }
                self.emit(Instruction::Call(args.len()));
            }
            Expr::Unary { op, operand } => {
                self.expr(operand)?;
                self.emit(Instruction::Unary(*op));
            }
            Expr::Binary { op, left, right } => {
                self.expr(left)?;
                self.expr(right)?;
                self.emit(Instruction::Binary(*op));
            }
            Expr::Compare { op, left, right } => {
                self.expr(left)?;
                self.expr(right)?;
                self.emit(Instruction::Compare(*op));
            }
            Expr::And(left, right) => {
                self.expr(left)?;
                let jump = self.emit(Instruction::JumpIfFalseOrPop(0));
                self.expr(right)?;
                let end = self.here();
                self.patch(jump, end);
            }
            Expr::Or(left, right) => {
                self.expr(left)?;
                let jump = self.emit(Instruction::JumpIfTrueOrPop(0));
                self.expr(right)?;
                let end = self.here();
                self.patch(jump, end);
            }
        }
        Ok(())
    }
}

fn validation(line: usize, message: &str) -> ScriptError {
    ScriptError::Validation(format!("{} on line {}", message, line))
}
