//! The ALU.
//!
//! Each operation works on resolved [`Argument`]s through a step-scoped
//! [`Cpu`] and updates the thread's O, S, Z and C flags the way two's
//! complement hardware would. All arithmetic wraps at the operation width
//! (8 or 16 bits); multiply and divide use double-width accumulators.

use crate::cpu::argument::{Argument, Cpu, Width};
use crate::cpu::execute::Fault;
use crate::cpu::thread::Thread;

/// Two's-complement negation at `width`.
#[inline]
fn negate(value: u16, width: Width) -> u16 {
    (!value).wrapping_add(1) & width.mask()
}

/// Set Z and S from a result.
#[inline]
fn set_zs(cpu: &mut Cpu<'_>, result: u16, width: Width) {
    cpu.thread.flags.z = result == 0;
    cpu.thread.flags.s = width.is_negative(result);
}

/// Shared body of `add`, `sub` and `cmp`: `a + b` where `b` has already been
/// negated for subtraction. `b_negative` is the sign the addend is treated
/// as having.
fn sum(cpu: &mut Cpu<'_>, a: u16, b: u16, b_negative: bool, width: Width) -> u16 {
    let result = a.wrapping_add(b) & width.mask();
    let a_negative = width.is_negative(a);
    let r_negative = width.is_negative(result);

    set_zs(cpu, result, width);
    cpu.thread.flags.o = a_negative == b_negative && r_negative != a_negative;
    result
}

/// `a = a + b`
pub fn add(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    let width = Argument::op_width(a, b);
    let va = cpu.read(a, width);
    let vb = cpu.read(b, width);

    let result = sum(cpu, va, vb, width.is_negative(vb), width);
    cpu.thread.flags.c = result < va || result < vb;
    cpu.write(a, result, width)?;
    Ok(())
}

/// `a - b` as addition of the negated operand. Returns the result without
/// storing it.
fn difference(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> (u16, Width) {
    let width = Argument::op_width(a, b);
    let va = cpu.read(a, width);
    let vb = cpu.read(b, width);

    let result = sum(cpu, va, negate(vb, width), !width.is_negative(vb), width);
    cpu.thread.flags.c = va < vb;
    (result, width)
}

/// `a = a - b`
pub fn sub(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    let (result, width) = difference(cpu, a, b);
    cpu.write(a, result, width)?;
    Ok(())
}

/// Flags of `a - b`, leaving `a` untouched.
pub fn cmp(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    difference(cpu, a, b);
    Ok(())
}

/// `a = a + 1`. Carry is untouched.
pub fn inc(cpu: &mut Cpu<'_>, arg: &Argument) -> Result<(), Fault> {
    let width = arg.width();
    let result = cpu.read(arg, width).wrapping_add(1) & width.mask();

    set_zs(cpu, result, width);
    cpu.thread.flags.o = result == 0 || result == width.sign_bit();
    cpu.write(arg, result, width)?;
    Ok(())
}

/// `a = a - 1`. Carry is untouched.
pub fn dec(cpu: &mut Cpu<'_>, arg: &Argument) -> Result<(), Fault> {
    let width = arg.width();
    let value = cpu.read(arg, width);
    let result = value.wrapping_sub(1) & width.mask();

    cpu.thread.flags.o = value == 0 || value == width.sign_bit();
    set_zs(cpu, result, width);
    cpu.write(arg, result, width)?;
    Ok(())
}

#[inline]
fn set_oc(thread: &mut Thread, overflow: bool) {
    thread.flags.o = overflow;
    thread.flags.c = overflow;
}

/// Unsigned multiply.
///
/// 8-bit: `AX = AL * arg`, only AL changes when the product fits.
/// 16-bit: `BX:AX = AX * arg`, BX only changes when the product overflows.
pub fn mul(cpu: &mut Cpu<'_>, arg: &Argument) -> Result<(), Fault> {
    let width = arg.width();
    let operand = cpu.read(arg, width);
    let thread = &mut *cpu.thread;

    match width {
        Width::Byte => {
            let product = operand * Thread::low(thread.ax) as u16;
            let overflow = product & 0xFF00 != 0;
            set_oc(thread, overflow);
            thread.ax = if overflow {
                product
            } else {
                (thread.ax & 0xFF00) | product
            };
        }
        Width::Word => {
            let product = operand as u32 * thread.ax as u32;
            let overflow = product & 0xFFFF_0000 != 0;
            set_oc(thread, overflow);
            thread.ax = product as u16;
            if overflow {
                thread.bx = (product >> 16) as u16;
            }
        }
    }
    Ok(())
}

/// Signed multiply, laid out like [`mul`].
pub fn imul(cpu: &mut Cpu<'_>, arg: &Argument) -> Result<(), Fault> {
    let width = arg.width();
    let operand = cpu.read(arg, width);
    let thread = &mut *cpu.thread;

    match width {
        Width::Byte => {
            let product = operand as u8 as i8 as i16 * Thread::low(thread.ax) as i8 as i16;
            let overflow = i8::try_from(product).is_err();
            set_oc(thread, overflow);
            thread.ax = if overflow {
                product as u16
            } else {
                (thread.ax & 0xFF00) | (product as u8 as u16)
            };
        }
        Width::Word => {
            let product = operand as i16 as i32 * thread.ax as i16 as i32;
            let overflow = i16::try_from(product).is_err();
            set_oc(thread, overflow);
            thread.ax = product as u16;
            if overflow {
                thread.bx = (product >> 16) as u16;
            }
        }
    }
    Ok(())
}

/// Unsigned divide.
///
/// 8-bit: `AL = AX / arg`, `AH = AX % arg`.
/// 16-bit: `AX = BX:AX / arg`, `BX = BX:AX % arg`.
/// O is set when the quotient does not fit its register.
pub fn div(cpu: &mut Cpu<'_>, arg: &Argument) -> Result<(), Fault> {
    let width = arg.width();
    let divisor = cpu.read(arg, width);
    if divisor == 0 {
        return Err(Fault::DivideByZero);
    }
    let thread = &mut *cpu.thread;

    match width {
        Width::Byte => {
            let n = thread.ax;
            let (q, r) = (n / divisor, n % divisor);
            thread.flags.o = q > 0xFF;
            thread.ax = (r << 8) | (q & 0x00FF);
        }
        Width::Word => {
            let n = (thread.bx as u32) << 16 | thread.ax as u32;
            let d = divisor as u32;
            let (q, r) = (n / d, n % d);
            thread.flags.o = q > 0xFFFF;
            thread.ax = q as u16;
            thread.bx = r as u16;
        }
    }
    Ok(())
}

/// Signed divide, laid out like [`div`]. Quotients truncate toward zero.
pub fn idiv(cpu: &mut Cpu<'_>, arg: &Argument) -> Result<(), Fault> {
    let width = arg.width();
    let divisor = cpu.read(arg, width);
    if divisor == 0 {
        return Err(Fault::DivideByZero);
    }
    let thread = &mut *cpu.thread;

    match width {
        Width::Byte => {
            let n = thread.ax as i16 as i32;
            let d = divisor as u8 as i8 as i32;
            let (q, r) = (n / d, n % d);
            thread.flags.o = i8::try_from(q).is_err();
            thread.ax = ((r as u16) << 8) | (q as u8 as u16);
        }
        Width::Word => {
            let n = ((thread.bx as u32) << 16 | thread.ax as u32) as i32 as i64;
            let d = divisor as i16 as i64;
            let (q, r) = (n / d, n % d);
            thread.flags.o = i16::try_from(q).is_err();
            thread.ax = q as u16;
            thread.bx = r as u16;
        }
    }
    Ok(())
}

/// Two's-complement negation at the operand's own width.
pub fn neg(cpu: &mut Cpu<'_>, arg: &Argument) -> Result<(), Fault> {
    let width = arg.width();
    let value = cpu.read(arg, width);
    let result = negate(value, width);

    let flags = &mut cpu.thread.flags;
    flags.z = value == 0;
    flags.c = value != 0;
    flags.o = value == width.sign_bit();
    flags.s = width.is_negative(result);
    cpu.write(arg, result, width)?;
    Ok(())
}

/// Bitwise complement at the operand's own width. Flags are untouched.
pub fn not(cpu: &mut Cpu<'_>, arg: &Argument) -> Result<(), Fault> {
    let width = arg.width();
    let value = cpu.read(arg, width);
    cpu.write(arg, !value, width)?;
    Ok(())
}

fn logic(
    cpu: &mut Cpu<'_>,
    a: &Argument,
    b: &Argument,
    op: impl Fn(u16, u16) -> u16,
) -> Result<(), Fault> {
    let width = Argument::op_width(a, b);
    let result = op(cpu.read(a, width), cpu.read(b, width)) & width.mask();

    set_oc(cpu.thread, false);
    set_zs(cpu, result, width);
    cpu.write(a, result, width)?;
    Ok(())
}

pub fn and(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    logic(cpu, a, b, |x, y| x & y)
}

pub fn or(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    logic(cpu, a, b, |x, y| x | y)
}

pub fn xor(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    logic(cpu, a, b, |x, y| x ^ y)
}

/// Logical shift left by `b`'s value.
///
/// C is the last bit shifted out of the top. O is only updated for a
/// one-bit shift, where it reports a sign change.
pub fn shl(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    let width = Argument::op_width(a, b);
    let value = cpu.read(a, width) as u32;
    let count = cpu.read_natural(b) as u32;

    let probe = value.checked_shl(count.saturating_sub(1)).unwrap_or(0);
    let carry = probe & width.sign_bit() as u32 != 0;
    let result = (value.checked_shl(count).unwrap_or(0) & width.mask() as u32) as u16;

    set_zs(cpu, result, width);
    let flags = &mut cpu.thread.flags;
    flags.c = carry;
    if count == 1 {
        flags.o = flags.s != carry;
    }
    cpu.write(a, result, width)?;
    Ok(())
}

/// Logical shift right by `b`'s value.
///
/// C is the last bit shifted out of the bottom. O is the original top bit.
pub fn shr(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    let width = Argument::op_width(a, b);
    let value = cpu.read(a, width);
    let count = cpu.read_natural(b) as u32;

    let probe = value.checked_shr(count.saturating_sub(1)).unwrap_or(0);
    let result = value.checked_shr(count).unwrap_or(0);

    let flags = &mut cpu.thread.flags;
    flags.o = width.is_negative(value);
    flags.c = probe & 1 != 0;
    set_zs(cpu, result, width);
    cpu.write(a, result, width)?;
    Ok(())
}

/// Copy `b` into `a` at `b`'s width.
pub fn mov(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    cpu.write_from(a, b)?;
    Ok(())
}

pub fn swp(cpu: &mut Cpu<'_>, a: &Argument, b: &Argument) -> Result<(), Fault> {
    cpu.swap(a, b)
}

/// Software interrupt. Reserved; currently does nothing.
pub fn int(_cpu: &mut Cpu<'_>, _a: &Argument, _b: &Argument) -> Result<(), Fault> {
    Ok(())
}
