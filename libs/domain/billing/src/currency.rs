// [libs/domain/billing/src/currency.rs]
/*!
 * =================================================================
 * APARATO: CURRENCY DISPLAY FORMATTER (V4.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: RENDERIZADO MONETARIO MULTI-DIVISA
 *
 * Reglas del contrato:
 * - Divisas cero-decimales: símbolo + piso de centavos, sin separador.
 * - Divisas dos-decimales: símbolo + centavos/100 con dos decimales;
 *   las fracciones sub-centavo se propagan ($0.015).
 * - Divisa desconocida: código en mayúsculas + espacio + monto.
 * - Negativos: el signo precede al símbolo.
 * =================================================================
 */

/// Divisas sin subdivisión decimal según el procesador de pagos.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code {
        "usd" | "aud" | "cad" | "nzd" | "sgd" | "hkd" | "mxn" => Some("$"),
        "eur" => Some("€"),
        "gbp" => Some("£"),
        "jpy" | "cny" => Some("¥"),
        "krw" => Some("₩"),
        "inr" => Some("₹"),
        "brl" => Some("R$"),
        "chf" => Some("CHF "),
        _ => None,
    }
}

/// Monto decimal con mínimo dos decimales y propagación sub-centavo.
fn format_major_units(major_amount: f64) -> String {
    let rendered = format!("{:.6}", major_amount);
    let trimmed = rendered.trim_end_matches('0');
    match trimmed.split_once('.') {
        Some((integer_part, decimal_part)) if decimal_part.len() >= 2 => {
            format!("{}.{}", integer_part, decimal_part)
        }
        Some((integer_part, decimal_part)) => {
            format!("{}.{:0<2}", integer_part, decimal_part)
        }
        None => format!("{}.00", trimmed),
    }
}

/// Renderiza un monto en centavos (posiblemente fraccionarios) a su
/// representación de pantalla para la divisa dada.
pub fn format_cents(cents: f64, currency_code: &str) -> String {
    let normalized_code = currency_code.to_ascii_lowercase();
    let is_negative = cents < 0.0;
    let magnitude = cents.abs();
    let sign = if is_negative { "-" } else { "" };

    if ZERO_DECIMAL_CURRENCIES.contains(&normalized_code.as_str()) {
        let whole_units = magnitude.floor() as i64;
        let symbol = currency_symbol(&normalized_code)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("{} ", normalized_code.to_ascii_uppercase()));
        return format!("{}{}{}", sign, symbol, whole_units);
    }

    let body = format_major_units(magnitude / 100.0);
    match currency_symbol(&normalized_code) {
        Some(symbol) => format!("{}{}{}", sign, symbol, body),
        None => format!("{}{} {}", sign, normalized_code.to_ascii_uppercase(), body),
    }
}
