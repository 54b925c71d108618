/// İmzası doğrulanmış isteğin payload sınıflandırması.
///
/// Boş payload POST-as-GET, tam olarak `{}` olan payload boş JSON sayılır;
/// iki bayrak aynı anda doğru olamaz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload {
    /// Ham payload baytları.
    pub value: Vec<u8>,
    /// Gövde POST-as-GET mi?
    pub is_post_as_get: bool,
    /// Gövde tam olarak `{}` mi?
    pub is_empty_json: bool,
}

impl VerifiedPayload {
    /// Payload baytlarını sınıflandırır.
    #[must_use]
    pub fn classify(value: Vec<u8>) -> Self {
        let is_post_as_get = value.is_empty();
        let is_empty_json = value == b"{}";
        Self {
            value,
            is_post_as_get,
            is_empty_json,
        }
    }
}
