// [tests/mirror/libs/domain/billing/currency_format.test.rs]
/**
 * =================================================================
 * APARATO: CURRENCY FORMAT TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE RENDERIZADO MONETARIO
 * =================================================================
 */

use proptest::prelude::*;
use tesoro_domain_billing::format_cents;

#[test]
fn certify_two_decimal_currencies() {
    assert_eq!(format_cents(1234.0, "usd"), "$12.34");
    assert_eq!(format_cents(100.0, "usd"), "$1.00");
    assert_eq!(format_cents(0.0, "usd"), "$0.00");
    assert_eq!(format_cents(999.0, "eur"), "€9.99");
    assert_eq!(format_cents(50.0, "gbp"), "£0.50");
}

#[test]
fn certify_sub_cent_fractions_propagate() {
    // 1.5 centavos en USD se renderiza con el sub-centavo visible.
    assert_eq!(format_cents(1.5, "usd"), "$0.015");
    assert_eq!(format_cents(0.001, "usd"), "$0.00001");
    assert_eq!(format_cents(1234.5, "usd"), "$12.345");
}

#[test]
fn certify_zero_decimal_currencies_floor() {
    assert_eq!(format_cents(1234.0, "jpy"), "¥1234");
    assert_eq!(format_cents(1234.9, "jpy"), "¥1234");
    assert_eq!(format_cents(500.0, "krw"), "₩500");
}

#[test]
fn certify_unknown_currency_uses_uppercase_code() {
    assert_eq!(format_cents(1234.0, "dkk"), "DKK 12.34");
    assert_eq!(format_cents(75.0, "pln"), "PLN 0.75");
}

#[test]
fn certify_negative_sign_precedes_symbol() {
    assert_eq!(format_cents(-500.0, "usd"), "-$5.00");
    assert_eq!(format_cents(-1234.0, "jpy"), "-¥1234");
    assert_eq!(format_cents(-75.0, "pln"), "-PLN 0.75");
}

#[test]
fn certify_case_insensitive_codes() {
    assert_eq!(format_cents(100.0, "USD"), "$1.00");
    assert_eq!(format_cents(100.0, "Jpy"), "¥100");
}

proptest! {
    /// Todo monto entero en USD rinde exactamente dos decimales.
    #[test]
    fn certify_integer_cents_render_two_decimals(cents in 0i64..100_000_000i64) {
        let rendered = format_cents(cents as f64, "usd");
        let decimals = rendered.split('.').nth(1).map(str::len);
        prop_assert_eq!(decimals, Some(2));
    }
}
