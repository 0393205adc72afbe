#[cfg(test)]
mod tests {
    use super::super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_uses_form_field_names() {
        let body = json!({
            "nombre": "Ana",
            "apellidoPaterno": "López",
            "curp": "LOAA000101MJCPNNA1",
            "correo": "ana@example.com",
            "password": "s3cret",
            "consentimientoAceptado": true,
            "celular": "3312345678",
            "direccion": {"calle": "Av. Juárez", "codigoPostal": "44100"},
            "folio_antiguo": "1234-5678-9012-0005",
            "foto": "aGVsbG8="
        });

        let request: RegistrationRequest = serde_json::from_value(body).unwrap();

        assert_eq!(request.given_name.as_deref(), Some("Ana"));
        assert_eq!(request.paternal_surname.as_deref(), Some("López"));
        assert_eq!(request.national_id.as_deref(), Some("LOAA000101MJCPNNA1"));
        assert_eq!(request.consent, Some(json!(true)));
        assert_eq!(request.legacy_folio.as_deref(), Some("1234-5678-9012-0005"));
        let address = request.address.unwrap();
        assert_eq!(address.street.as_deref(), Some("Av. Juárez"));
        assert_eq!(address.postal_code.as_deref(), Some("44100"));
        assert_eq!(address.municipality, None);
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(false), json!(null), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{} should be falsy", falsy);
        }
        for truthy in [json!(true), json!(1), json!("false"), json!([0]), json!({"a": 1})] {
            assert!(is_truthy(&truthy), "{} should be truthy", truthy);
        }
    }

    #[test]
    fn test_response_serialization() {
        let response = RegistrationResponse::from_outcome(RegistrationOutcome {
            beneficiary_id: 7,
            digital_folio: "BJ-2026-10-000007-3".to_string(),
            legacy_folio: "1234567890120005".to_string(),
            card_type: CardType::Mixed,
        });

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["folio_legacy"], json!("1234567890120005"));
        assert_eq!(value["folio_legacy_display"], json!("1234-5678-9012-0005"));
        assert_eq!(value["tipo"], json!("mixed"));
    }

    #[test]
    fn test_card_type_strings() {
        assert_eq!(CardType::Digital.as_str(), "digital");
        assert_eq!(CardType::Mixed.to_string(), "mixed");
        assert_eq!(serde_json::to_value(CardType::Digital).unwrap(), json!("digital"));
    }
}
