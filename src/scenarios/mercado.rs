//! Market service contract: markets, produce (fruits and vegetables) and
//! bakery items (sweets and savouries) nested under a market.
//!
//! Expectations are declared exactly as the service is known to answer,
//! including the 200 on deleting a fruit from a market that does not exist
//! and the `__Id` capture path on product creation.

use serde_json::json;

use crate::data::DataGenerator;
use crate::scenario::{Scenario, Step};

pub const MERCADO_BASE_URL: &str = "https://api-desafio-qa.onrender.com/mercado";

/// Ids no market or product will ever have.
const MISSING_MARKET: &str = "99999";
const MISSING_MARKET_FOR_DELETE: &str = "999999";
const MISSING_FRUIT: &str = "9999";

/// Build the scenario. Payloads are drawn from `data` when the scenario is
/// built, so the same seed always produces the same requests.
pub fn mercado_scenario(data: &mut dyn DataGenerator) -> Scenario {
    Scenario::new("mercado")
        .step(
            Step::post("create market", "/")
                .json(json!({
                    "nome": data.company_name(),
                    "cnpj": data.registration_number(),
                    "endereco": data.secondary_address(),
                }))
                .expect_status(201)
                .capture("mercadoId", "_id"),
        )
        .step(
            Step::post("create market with malformed cnpj", "/")
                .json(json!({
                    "nome": data.company_name(),
                    "cnpj": "123",
                    "endereco": data.secondary_address(),
                }))
                .expect_status(400),
        )
        .step(
            // Dropped by the request builder: GET carries no body.
            Step::get("list markets", "/")
                .json(json!([{ "id": 1 }]))
                .expect_status(200),
        )
        .step(Step::delete("delete market", "/{{mercadoId}}").expect_status(200))
        .step(
            Step::put("update market", "/{{mercadoId}}")
                .json(json!([{ "nome": data.company_name() }]))
                .expect_status(200),
        )
        .step(
            Step::put("update market with invalid cnpj", "/{{mercadoId}}")
                .json(json!([{ "cnpj": data.int_between(1, 100).to_string() }]))
                .expect_status(400),
        )
        .step(
            Step::put("update missing market", "/999")
                .json(json!([{ "cnpj": data.int_between(1, 100).to_string() }]))
                .expect_status(400),
        )
        .step(
            Step::post("create fruit", "/{{mercadoId}}/produtos/hortifuit/frutas")
                .json(json!([{ "nome": data.fruit(), "valor": data.price() }]))
                .expect_status(201)
                .capture("frutaId", "__Id"),
        )
        .step(
            Step::post(
                "create fruit in missing market",
                format!("/{MISSING_MARKET}/produtos/hortifuit/frutas"),
            )
            .json(json!([{ "nome": data.fruit(), "valor": data.price() }]))
            .expect_status(404),
        )
        .step(
            Step::delete(
                "delete fruit",
                "/{{mercadoId}}/produtos/hortifuit/frutas/{{frutaId}}",
            )
            .expect_status(200),
        )
        .step(
            Step::delete(
                "delete fruit from missing market",
                format!("/{MISSING_MARKET_FOR_DELETE}/produtos/hortifuit/frutas/{MISSING_FRUIT}"),
            )
            .expect_status(200),
        )
        .step(
            Step::post("create vegetable", "/{{mercadoId}}/produtos/hortifuit/legumes")
                .json(json!([{ "nome": data.vegetable(), "valor": data.price() }]))
                .expect_status(201),
        )
        .step(
            Step::post("create sweet", "/{{mercadoId}}/produtos/padaria/doces")
                .json(json!([{ "nome": data.ingredient(), "valor": data.price() }]))
                .expect_status(201),
        )
        .step(
            Step::post("create savoury", "/{{mercadoId}}/produtos/padaria/salgado")
                .json(json!([{ "nome": data.ingredient(), "valor": data.price() }]))
                .expect_status(201)
                .capture("salgadoId", "__Id"),
        )
        .step(
            Step::get("list savouries", "/{{mercadoId}}/produtos/padaria/salgado")
                .expect_status(200),
        )
        .step(
            Step::get(
                "list savouries of missing market",
                format!("/{MISSING_MARKET}/produtos/padaria/salgado"),
            )
            .expect_status(404),
        )
}
