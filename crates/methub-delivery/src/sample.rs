use serde_json::{json, Value};

/// Canned payload for destination test calls. Mirrors the WhatsApp
/// message envelope so customer endpoints exercise their real parsing
/// path; the `test` metadata flag lets them drop it before side effects.
pub fn test_payload() -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "0",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550000000",
                        "phone_number_id": "TEST"
                    },
                    "messages": [{
                        "from": "15550000001",
                        "id": "wamid.test",
                        "type": "text",
                        "text": { "body": "methub destination test" }
                    }]
                }
            }]
        }],
        "metadata": { "test": true, "source": "methub" }
    })
}
