use crate::domain::model::Scalar;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("format string has no placeholder")]
    NoPlaceholder,

    #[error("format string has more than one placeholder")]
    TooManyPlaceholders,

    #[error("incomplete placeholder at end of format string")]
    Incomplete,

    #[error("unsupported conversion '%{0}'")]
    UnsupportedConversion(char),

    #[error("'%{conversion}' requires a number, got '{value}'")]
    TypeMismatch { conversion: char, value: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Placeholder {
    left_align: bool,
    plus_sign: bool,
    space_sign: bool,
    zero_pad: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: char,
}

/// printf 風格的單一佔位符格式，例如 `"%.2f"`、`"ID-%05d"`、`"%s m²"`
#[derive(Debug, Clone, PartialEq)]
pub struct PercentFormat {
    prefix: String,
    placeholder: Placeholder,
    suffix: String,
}

impl PercentFormat {
    pub fn parse(format: &str) -> Result<Self, FormatError> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut placeholder: Option<Placeholder> = None;
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                if placeholder.is_some() {
                    suffix.push(c);
                } else {
                    prefix.push(c);
                }
                continue;
            }

            if chars.peek() == Some(&'%') {
                chars.next();
                if placeholder.is_some() {
                    suffix.push('%');
                } else {
                    prefix.push('%');
                }
                continue;
            }

            if placeholder.is_some() {
                return Err(FormatError::TooManyPlaceholders);
            }

            let mut spec = Placeholder::default();
            while let Some(&flag) = chars.peek() {
                match flag {
                    '-' => spec.left_align = true,
                    '+' => spec.plus_sign = true,
                    ' ' => spec.space_sign = true,
                    '0' => spec.zero_pad = true,
                    _ => break,
                }
                chars.next();
            }

            spec.width = take_number(&mut chars);
            if chars.peek() == Some(&'.') {
                chars.next();
                spec.precision = Some(take_number(&mut chars).unwrap_or(0));
            }

            match chars.next() {
                Some(
                    conv @ ('s' | 'd' | 'i' | 'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x' | 'X' | 'o'),
                ) => spec.conversion = conv,
                // `%u` 與 `%d` 相同
                Some('u') => spec.conversion = 'd',
                Some(other) => return Err(FormatError::UnsupportedConversion(other)),
                None => return Err(FormatError::Incomplete),
            }
            placeholder = Some(spec);
        }

        let placeholder = placeholder.ok_or(FormatError::NoPlaceholder)?;
        Ok(Self {
            prefix,
            placeholder,
            suffix,
        })
    }

    pub fn render(&self, value: &Scalar) -> Result<String, FormatError> {
        let spec = &self.placeholder;
        let (sign, body, numeric) = match spec.conversion {
            's' => {
                let mut text = value.to_string();
                if let Some(p) = spec.precision {
                    text = text.chars().take(p).collect();
                }
                (String::new(), text, false)
            }
            'd' | 'i' => {
                let n = integer_of(value, spec.conversion, true)?;
                (sign_of(n < 0, spec), n.unsigned_abs().to_string(), true)
            }
            'x' | 'X' | 'o' => {
                let n = integer_of(value, spec.conversion, false)?;
                let abs = n.unsigned_abs();
                let body = match spec.conversion {
                    'x' => format!("{:x}", abs),
                    'X' => format!("{:X}", abs),
                    _ => format!("{:o}", abs),
                };
                (sign_of(n < 0, spec), body, true)
            }
            conv => {
                let f = float_of(value, conv)?;
                let precision = spec.precision.unwrap_or(6);
                let body = match conv {
                    'e' | 'E' => exponent_body(f.abs(), precision, conv == 'E'),
                    'g' | 'G' => general_body(f.abs(), precision, conv == 'G'),
                    _ => format!("{:.*}", precision, f.abs()),
                };
                (sign_of(f.is_sign_negative() && f != 0.0, spec), body, true)
            }
        };

        Ok(format!(
            "{}{}{}",
            self.prefix,
            pad(sign, body, numeric, spec),
            self.suffix
        ))
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&d) = chars.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        digits.push(d);
        chars.next();
    }
    digits.parse().ok()
}

fn sign_of(negative: bool, spec: &Placeholder) -> String {
    if negative {
        "-".to_string()
    } else if spec.plus_sign {
        "+".to_string()
    } else if spec.space_sign {
        " ".to_string()
    } else {
        String::new()
    }
}

fn mismatch(conversion: char, value: &Scalar) -> FormatError {
    FormatError::TypeMismatch {
        conversion,
        value: value.to_string(),
    }
}

fn integer_of(value: &Scalar, conversion: char, allow_float: bool) -> Result<i64, FormatError> {
    match value {
        Scalar::Int(i) => Ok(*i),
        Scalar::Bool(b) => Ok(i64::from(*b)),
        Scalar::Float(f) if allow_float && f.is_finite() => Ok(f.trunc() as i64),
        other => Err(mismatch(conversion, other)),
    }
}

fn float_of(value: &Scalar, conversion: char) -> Result<f64, FormatError> {
    match value {
        Scalar::Float(f) => Ok(*f),
        Scalar::Int(i) => Ok(*i as f64),
        Scalar::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(mismatch(conversion, other)),
    }
}

/// 四捨五入到 `precision` 位小數後的尾數與指數
fn scientific_parts(f: f64, precision: usize) -> (String, i32) {
    let raw = format!("{:.*e}", precision, f);
    match raw.split_once('e') {
        Some((mantissa, exponent)) => (mantissa.to_string(), exponent.parse().unwrap_or(0)),
        None => (raw, 0),
    }
}

fn join_exponent(mantissa: &str, exponent: i32, upper: bool) -> String {
    let sign = if exponent < 0 { '-' } else { '+' };
    let marker = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, marker, sign, exponent.abs())
}

/// 指數表示法，指數至少兩位數（例如 `3.70e+00`）
fn exponent_body(f: f64, precision: usize, upper: bool) -> String {
    if !f.is_finite() {
        return f.to_string();
    }
    let (mantissa, exponent) = scientific_parts(f, precision);
    join_exponent(&mantissa, exponent, upper)
}

fn strip_trailing_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// `%g`：有效位數為 precision，指數在 [-4, precision) 內用小數，否則用指數；去掉尾端的 0
fn general_body(f: f64, precision: usize, upper: bool) -> String {
    if !f.is_finite() {
        let text = if f.is_nan() { "nan" } else { "inf" };
        return if upper { text.to_uppercase() } else { text.to_string() };
    }

    let significant = precision.max(1);
    let (mantissa, exponent) = scientific_parts(f, significant - 1);

    if exponent >= -4 && exponent < significant as i32 {
        let decimals = (significant as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, f)).to_string()
    } else {
        join_exponent(strip_trailing_zeros(&mantissa), exponent, upper)
    }
}

fn pad(sign: String, body: String, numeric: bool, spec: &Placeholder) -> String {
    let len = sign.chars().count() + body.chars().count();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        return format!("{}{}", sign, body);
    }

    let fill = width - len;
    if spec.left_align {
        format!("{}{}{}", sign, body, " ".repeat(fill))
    } else if spec.zero_pad && numeric {
        format!("{}{}{}", sign, "0".repeat(fill), body)
    } else {
        format!("{}{}{}", " ".repeat(fill), sign, body)
    }
}
