// [libs/domain/ledger/src/tests_grammar.rs]
/**
 * =================================================================
 * APARATO: LEDGER GRAMMAR TEST (V4.0 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-LEDGER)
 * RESPONSABILIDAD: CERTIFICACIÓN DE ESCALA MICRO-CENTAVO Y PARIDAD JSON
 * =================================================================
 */
