//! 有理数类型, 用于时间基 (time_base)、采样率换算等场景.
//!
//! 对标 FFmpeg 的 `AVRational` 及 `av_reduce` / `av_rescale_rnd`.
//!
//! 所有时间戳换算都经过本模块, 舍入方式由调用方显式指定.
//! 音频重采样的无漂移时间戳依赖于始终使用同一种舍入方式 (`Rounding::Down`).

use std::cmp::Ordering;
use std::fmt;

/// 约分时使用的默认最大分子/分母
const MAX_TERM: i64 = i32::MAX as i64;

/// 舍入方式
///
/// 对标 FFmpeg 的 `AVRounding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rounding {
    /// 向零舍入 (截断)
    Zero,
    /// 远离零舍入
    Inf,
    /// 向负无穷舍入
    Down,
    /// 向正无穷舍入
    Up,
    /// 四舍五入, 恰好一半时远离零
    #[default]
    NearInf,
}

impl Rounding {
    /// 对负数取反求值时应使用的舍入方式 (向下与向上互换)
    const fn mirrored(self) -> Self {
        match self {
            Self::Down => Self::Up,
            Self::Up => Self::Down,
            other => other,
        }
    }
}

/// 有理数, 由分子和分母组成
///
/// 分母为 0 时表示特殊值: 分子非零为带符号无穷, 分子为零为 NaN.
/// 通过 [`Rational::make`] 或算术运算得到的值始终是约分后的形式.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 直接以给定分子分母构造, 不做约分 (用于常量)
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 构造并约分
    pub fn make(num: i32, den: i32) -> Self {
        Self::reduce(i64::from(num), i64::from(den), MAX_TERM).0
    }

    /// 零值
    pub const ZERO: Self = Self { num: 0, den: 1 };

    /// 未定义 (0/0, 即 NaN)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 常用时间基: 微秒 (1/1_000_000)
    pub const MICRO: Self = Self {
        num: 1,
        den: 1_000_000,
    };

    /// 常用时间基: 毫秒 (1/1_000)
    pub const MILLI: Self = Self { num: 1, den: 1_000 };

    /// 采样率对应的时间基 `1/rate`; 为 0 或超出 `i32` 时为 [`Rational::UNDEFINED`]
    pub fn for_sample_rate(rate: u32) -> Self {
        match i32::try_from(rate) {
            Ok(den) if den > 0 => Self::new(1, den),
            _ => Self::UNDEFINED,
        }
    }

    /// 判断是否为有限值 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 求 `num/den` 在分子分母均不超过 `max` 时的最佳有理逼近
    ///
    /// 使用连分数展开; 当结果与原值完全相等时返回的布尔值为 `true`.
    pub fn reduce(num: i64, den: i64, max: i64) -> (Self, bool) {
        let negative = (num < 0) ^ (den < 0);
        let max = i128::from(max.max(1));
        let mut num = i128::from(num).abs();
        let mut den = i128::from(den).abs();
        let g = gcd_i128(num, den);
        if g != 0 {
            num /= g;
            den /= g;
        }

        // (分子, 分母) 形式的相邻两个渐近分数
        let mut a0: (i128, i128) = (0, 1);
        let mut a1: (i128, i128) = (1, 0);

        if num <= max && den <= max {
            a1 = (num, den);
            den = 0;
        }

        while den != 0 {
            let x = num / den;
            let next_den = num - den * x;
            let a2 = (x * a1.0 + a0.0, x * a1.1 + a0.1);

            if a2.0 > max || a2.1 > max {
                // 超出范围, 尝试一次中间分数
                let mut x = x;
                if a1.0 != 0 {
                    x = (max - a0.0) / a1.0;
                }
                if a1.1 != 0 {
                    x = x.min((max - a0.1) / a1.1);
                }
                if den * (2 * x * a1.1 + a0.1) > num * a1.1 {
                    a1 = (x * a1.0 + a0.0, x * a1.1 + a0.1);
                }
                break;
            }

            a0 = a1;
            a1 = a2;
            num = den;
            den = next_den;
        }

        let out_num = if negative { -a1.0 } else { a1.0 };
        let r = Self {
            num: clamp_i32(out_num),
            den: clamp_i32(a1.1),
        };
        (r, den == 0)
    }

    /// 从浮点数求最佳有理逼近, 分子分母不超过 `max`
    ///
    /// NaN 得到 0/0, 正负无穷及超出范围的值得到 ±1/0.
    pub fn from_f64(value: f64, max: i32) -> Self {
        if value.is_nan() {
            return Self::UNDEFINED;
        }
        if value.abs() > f64::from(i32::MAX) + 3.0 {
            return Self::new(if value < 0.0 { -1 } else { 1 }, 0);
        }
        let exponent = ((value.abs() + 1e-20).log2().floor() as i64).max(0);
        let den = 1i64 << (61 - exponent);
        let num = (value * den as f64 + 0.5).floor() as i64;
        Self::reduce(num, den, i64::from(max)).0
    }

    /// 转换为 f64 浮点数
    ///
    /// 分母为 0 时返回 `+inf` / `-inf` / `NaN`, 不做实际除法.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return match self.num.cmp(&0) {
                Ordering::Greater => f64::INFINITY,
                Ordering::Less => f64::NEG_INFINITY,
                Ordering::Equal => f64::NAN,
            };
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 求倒数, 保持分母非负
    pub fn invert(self) -> Self {
        if self.num < 0 {
            Self {
                num: self.den.saturating_neg(),
                den: self.num.saturating_neg(),
            }
        } else {
            Self {
                num: self.den,
                den: self.num,
            }
        }
    }

    /// 比较两个有理数的大小
    ///
    /// 任一方为 NaN 时返回 `None`.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let lhs = i64::from(self.num) * i64::from(other.den);
        let rhs = i64::from(other.num) * i64::from(self.den);
        let diff = lhs - rhs;
        if diff != 0 {
            let negative = (diff < 0) ^ (self.den < 0) ^ (other.den < 0);
            return Some(if negative {
                Ordering::Less
            } else {
                Ordering::Greater
            });
        }
        if self.den != 0 && other.den != 0 {
            return Some(Ordering::Equal);
        }
        if self.num != 0 && other.num != 0 {
            // 两个无穷大
            return Some(self.num.signum().cmp(&other.num.signum()));
        }
        None
    }

    /// 将 `value` 从时间基 `src` 换算到本时间基, 四舍五入
    pub fn rescale(&self, value: i64, src: Rational) -> i64 {
        self.rescale_rnd(value, src, Rounding::NearInf)
    }

    /// 将 `value` 从时间基 `src` 换算到本时间基, 使用指定舍入方式
    pub fn rescale_rnd(&self, value: i64, src: Rational, rounding: Rounding) -> i64 {
        rescale(
            value,
            i64::from(self.num),
            i64::from(self.den),
            i64::from(src.num),
            i64::from(src.den),
            rounding,
        )
    }
}

/// 计算 `value * (src_num * dst_den) / (dst_num * src_den)`
///
/// 中间结果使用 128 位整数, 按 `rounding` 精确舍入. 任一分子或分母为 0 时返回 0,
/// 结果超出 i64 范围时饱和.
pub fn rescale(
    value: i64,
    dst_num: i64,
    dst_den: i64,
    src_num: i64,
    src_den: i64,
    rounding: Rounding,
) -> i64 {
    if dst_num == 0 || dst_den == 0 || src_num == 0 || src_den == 0 {
        return 0;
    }
    let mut b = i128::from(src_num) * i128::from(dst_den);
    let mut c = i128::from(dst_num) * i128::from(src_den);
    let mut a = i128::from(value);
    if c < 0 {
        b = -b;
        c = -c;
    }
    if b < 0 {
        a = -a;
        b = -b;
    }
    let r = rescale_abc(a, b, c, rounding);
    i64::try_from(r).unwrap_or(if r < 0 { i64::MIN } else { i64::MAX })
}

/// `a * b / c` 的精确舍入, 要求 `b >= 0` 且 `c > 0`
fn rescale_abc(a: i128, b: i128, c: i128, rounding: Rounding) -> i128 {
    if a < 0 {
        return -rescale_abc(-a, b, c, rounding.mirrored());
    }
    let r = match rounding {
        Rounding::NearInf => c / 2,
        Rounding::Inf | Rounding::Up => c - 1,
        Rounding::Zero | Rounding::Down => 0,
    };
    (a * b + r) / c
}

/// 最大公约数
pub fn gcd(a: i64, b: i64) -> i64 {
    gcd_i128(i128::from(a).abs(), i128::from(b).abs()) as i64
}

/// 最小公倍数, 按 `a / gcd(a, b) * b` 计算, 避免中间溢出
pub fn lcm(a: i64, b: i64) -> i64 {
    let g = gcd(a, b);
    if g == 0 {
        return 0;
    }
    a / g * b
}

fn gcd_i128(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

fn clamp_i32(v: i128) -> i32 {
    v.clamp(i128::from(i32::MIN), i128::from(i32::MAX)) as i32
}

impl std::ops::Mul for Rational {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Self::reduce(
            i64::from(self.num) * i64::from(other.num),
            i64::from(self.den) * i64::from(other.den),
            MAX_TERM,
        )
        .0
    }
}

impl std::ops::Div for Rational {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        self * other.invert()
    }
}

impl std::ops::Add for Rational {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::reduce(
            i64::from(self.num) * i64::from(other.den) + i64::from(other.num) * i64::from(self.den),
            i64::from(self.den) * i64::from(other.den),
            MAX_TERM,
        )
        .0
    }
}

impl std::ops::Sub for Rational {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self + Self::new(other.num.saturating_neg(), other.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self::make(num, den)
    }
}

impl From<i32> for Rational {
    fn from(num: i32) -> Self {
        Self { num, den: 1 }
    }
}
