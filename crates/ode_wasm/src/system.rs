//! Compiled formula wrapper and shared conversion helpers.

use ode_core::Formula;
use wasm_bindgen::prelude::*;

pub(crate) fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

pub(crate) fn build_formula(expression: &str, var_names: &[String]) -> anyhow::Result<Formula> {
    if var_names.is_empty() {
        anyhow::bail!("At least one variable name is required.");
    }
    Ok(Formula::compile(expression, var_names)?)
}

#[wasm_bindgen]
pub struct WasmFormula {
    formula: Formula,
}

#[wasm_bindgen]
impl WasmFormula {
    #[wasm_bindgen(constructor)]
    pub fn new(expression: &str, var_names: Vec<String>) -> Result<WasmFormula, JsValue> {
        console_error_panic_hook::set_once();

        let formula = build_formula(expression, &var_names).map_err(to_js_error)?;
        Ok(WasmFormula { formula })
    }

    /// Evaluates with one value per variable, in declared order.
    pub fn eval(&self, args: &[f64]) -> Result<f64, JsValue> {
        self.formula.eval(args).map_err(to_js_error)
    }

    pub fn source(&self) -> String {
        self.formula.source().to_string()
    }

    pub fn variables(&self) -> Vec<String> {
        self.formula.variables().to_vec()
    }

    pub fn arity(&self) -> usize {
        self.formula.arity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_formula_rejects_unknown_symbols() {
        let vars = vec!["t".to_string(), "y".to_string()];
        let err = build_formula("t + z", &vars).expect_err("z is undeclared");
        assert!(err.to_string().contains("'z' is not defined"), "{err}");
    }

    #[test]
    fn build_formula_requires_variables() {
        assert!(build_formula("1", &[]).is_err());
    }

    #[test]
    fn wasm_formula_evaluates_and_reports_metadata() {
        let formula = WasmFormula::new("t^2 * y", vec!["t".to_string(), "y".to_string()])
            .expect("formula");
        assert_eq!(formula.eval(&[3.0, 2.0]).expect("eval"), 18.0);
        assert_eq!(formula.source(), "t^2 * y");
        assert_eq!(formula.variables(), vec!["t", "y"]);
        assert_eq!(formula.arity(), 2);
    }

    #[cfg(target_arch = "wasm32")]
    mod wasm {
        use super::super::WasmFormula;
        use wasm_bindgen_test::wasm_bindgen_test;

        #[wasm_bindgen_test]
        fn wasm_formula_surfaces_evaluation_errors() {
            let formula = WasmFormula::new("log(y)", vec!["t".to_string(), "y".to_string()])
                .expect("formula");
            let message = formula
                .eval(&[0.0, -1.0])
                .err()
                .and_then(|err| err.as_string())
                .unwrap_or_default();
            assert!(message.contains("math domain error"), "{message}");
        }
    }
}
