//! JSON:API wire types and the registry client.

use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::case::Sex;
use crate::common::http::RetryingClient;
use crate::err::RegistryError;

use super::conf::DecipherConfig;
use super::variants::{NormalizedVariant, Phenotype};
use super::RemoteId;

/// Media type of all request bodies.
pub const JSON_API: &str = "application/vnd.api+json";

const PATIENTS: &str = "patients";
const PHENOTYPES: &str = "phenotypes";
const VARIANTS: &str = "variants";

/// Top-level `{"data": ...}` wrapper.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Envelope<T> {
    pub data: T,
}

/// A resource object with its type tag.
#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Typed<'a, A> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attributes: &'a A,
}

/// Attributes of a patient to create.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub contact_account_id: RemoteId,
    pub chromosomal_sex: Sex,
    pub has_aneuploidy: bool,
    pub clinical_reference: String,
    pub has_consent: bool,
}

/// Location of the offending value of an error.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSource {
    #[serde(default)]
    pub pointer: Option<String>,
}

/// One entry of the `errors` array.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiError {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub source: Option<ErrorSource>,
}

impl ApiError {
    /// Index given by the last segment of the source pointer, e.g. `1` for `/data/1`.
    pub fn pointer_index(&self) -> Option<usize> {
        let pointer = self.source.as_ref()?.pointer.as_deref()?;
        pointer.rsplit('/').next()?.parse().ok()
    }

    pub fn detail_is(&self, detail: &str) -> bool {
        self.detail.as_deref() == Some(detail)
    }
}

/// Response document, carrying either data or errors.
#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Document<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl<T> Default for Document<T> {
    fn default() -> Self {
        Self {
            data: None,
            errors: Vec::new(),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientAttributes {
    #[serde(default)]
    pub clinical_reference: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PatientRelationships {
    #[serde(rename = "People", default)]
    pub people: Option<Envelope<Vec<PersonResource>>>,
}

/// A patient as returned by the registry.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PatientResource {
    pub id: RemoteId,
    #[serde(default)]
    pub attributes: PatientAttributes,
    #[serde(default)]
    pub relationships: Option<PatientRelationships>,
}

impl PatientResource {
    /// First person related to the patient, i.e., the proband.
    pub fn person_id(&self) -> Option<&RemoteId> {
        self.relationships
            .as_ref()?
            .people
            .as_ref()?
            .data
            .first()
            .map(|person| &person.id)
    }
}

/// A person as returned by the registry.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PersonResource {
    pub id: RemoteId,
}

/// Result of a write request that the registry may reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Accepted(T),
    Rejected(Vec<ApiError>),
}

/// Operations of the patient registry used by the submission.
pub trait RegistryApi {
    /// Create a patient, returning the created patient resources.
    fn create_patient(
        &self,
        patient: &NewPatient,
    ) -> Result<Outcome<Vec<PatientResource>>, RegistryError>;
    /// All patients of the project.
    fn list_patients(&self) -> Result<Vec<PatientResource>, RegistryError>;
    /// People related to a patient.
    fn people_for_patient(
        &self,
        patient_id: &RemoteId,
    ) -> Result<Vec<PersonResource>, RegistryError>;
    /// Create a batch of phenotypes.
    fn create_phenotypes(&self, phenotypes: &[Phenotype]) -> Result<Outcome<()>, RegistryError>;
    /// Create one variant.
    fn create_variant(&self, variant: &NormalizedVariant) -> Result<Outcome<()>, RegistryError>;
}

/// Registry client speaking JSON:API over HTTP.
#[derive(Debug)]
pub struct HttpRegistry {
    config: DecipherConfig,
    client: RetryingClient,
}

impl HttpRegistry {
    pub fn new(config: DecipherConfig) -> Result<Self, RegistryError> {
        let client = RetryingClient::new(config.retry)?;
        Ok(Self { config, client })
    }

    /// Send a request and parse the response document, logging the raw body.
    fn call<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(StatusCode, Document<T>), RegistryError>
    where
        T: DeserializeOwned,
        B: serde::Serialize,
    {
        let url = self.config.endpoint(path);
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(RegistryError::Encode)?;
        if let Some(body) = &body {
            tracing::debug!("{} {} <- {}", &method, &url, body);
        }

        let credentials = &self.config.credentials;
        let response = self.client.send(|client| {
            let request = client
                .request(method.clone(), &url)
                .header(header::CONTENT_TYPE, JSON_API)
                .header("X-Auth-Token-Client", &credentials.client_key)
                .header("X-Auth-Token-Account", &credentials.user_key);
            match &body {
                Some(body) => request.body(body.clone()),
                None => request,
            }
        })?;
        tracing::info!("{} {} -> {}: {}", &method, &url, response.status, &response.body);

        let document = if response.body.trim().is_empty() {
            Document::default()
        } else {
            serde_json::from_str(&response.body)
                .map_err(|source| RegistryError::InvalidBody { url, source })?
        };
        Ok((response.status, document))
    }

    /// Classify a write response into accepted data or rejection errors.
    fn outcome<T: Default>(
        path: &str,
        status: StatusCode,
        document: Document<T>,
    ) -> Result<Outcome<T>, RegistryError> {
        if !document.errors.is_empty() {
            Ok(Outcome::Rejected(document.errors))
        } else if !status.is_success() {
            Err(RegistryError::UnexpectedResponse(format!(
                "{} returned status {} without error details",
                path, status
            )))
        } else {
            Ok(Outcome::Accepted(document.data.unwrap_or_default()))
        }
    }

    /// Data of a read response, rejections are unexpected here.
    fn expect_data<T: Default>(
        path: &str,
        status: StatusCode,
        document: Document<T>,
    ) -> Result<T, RegistryError> {
        match Self::outcome(path, status, document)? {
            Outcome::Accepted(data) => Ok(data),
            Outcome::Rejected(errors) => Err(RegistryError::UnexpectedResponse(format!(
                "{} returned errors: {:?}",
                path, errors
            ))),
        }
    }
}

impl RegistryApi for HttpRegistry {
    fn create_patient(
        &self,
        patient: &NewPatient,
    ) -> Result<Outcome<Vec<PatientResource>>, RegistryError> {
        let body = Envelope {
            data: Typed {
                kind: "Patient",
                attributes: patient,
            },
        };
        let (status, document) = self.call(Method::POST, PATIENTS, Some(&body))?;
        Self::outcome(PATIENTS, status, document)
    }

    fn list_patients(&self) -> Result<Vec<PatientResource>, RegistryError> {
        let (status, document) = self.call(Method::GET, PATIENTS, None::<&()>)?;
        Self::expect_data(PATIENTS, status, document)
    }

    fn people_for_patient(
        &self,
        patient_id: &RemoteId,
    ) -> Result<Vec<PersonResource>, RegistryError> {
        let path = format!("{}/{}/people", PATIENTS, patient_id);
        let (status, document) = self.call(Method::GET, &path, None::<&()>)?;
        Self::expect_data(&path, status, document)
    }

    fn create_phenotypes(&self, phenotypes: &[Phenotype]) -> Result<Outcome<()>, RegistryError> {
        let body = Envelope {
            data: phenotypes
                .iter()
                .map(|phenotype| Typed {
                    kind: "Phenotype",
                    attributes: phenotype,
                })
                .collect::<Vec<_>>(),
        };
        let (status, document) =
            self.call::<serde_json::Value, _>(Method::POST, PHENOTYPES, Some(&body))?;
        Ok(match Self::outcome(PHENOTYPES, status, document)? {
            Outcome::Accepted(_) => Outcome::Accepted(()),
            Outcome::Rejected(errors) => Outcome::Rejected(errors),
        })
    }

    fn create_variant(&self, variant: &NormalizedVariant) -> Result<Outcome<()>, RegistryError> {
        let body = Envelope {
            data: Typed {
                kind: "Variant",
                attributes: variant,
            },
        };
        let (status, document) =
            self.call::<serde_json::Value, _>(Method::POST, VARIANTS, Some(&body))?;
        Ok(match Self::outcome(VARIANTS, status, document)? {
            Outcome::Accepted(_) => Outcome::Accepted(()),
            Outcome::Rejected(errors) => Outcome::Rejected(errors),
        })
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::{ApiError, HttpRegistry, NewPatient, Outcome, RegistryApi};
    use crate::case::{zygosity::Zygosity, Sex};
    use crate::common::{http::test_server, http::RetryPolicy, GenomeRelease};
    use crate::decipher::conf::{Credentials, DecipherConfigBuilder};
    use crate::decipher::variants::{NormalizedVariant, Phenotype, VariantClass};
    use crate::decipher::RemoteId;

    fn registry(url: &str) -> HttpRegistry {
        let config = DecipherConfigBuilder::default()
            .api_url(format!("{}/api/", url))
            .credentials(Credentials {
                client_key: "client-token".into(),
                user_key: "user-token".into(),
            })
            .submitter_id("42")
            .retry(RetryPolicy {
                max_attempts: 2,
                backoff_factor: Duration::ZERO,
                max_backoff: Duration::ZERO,
            })
            .build()
            .expect("invalid config");
        HttpRegistry::new(config).expect("could not create client")
    }

    fn new_patient() -> NewPatient {
        NewPatient {
            contact_account_id: RemoteId::from("42"),
            chromosomal_sex: Sex::Xx,
            has_aneuploidy: false,
            clinical_reference: "12345".into(),
            has_consent: false,
        }
    }

    #[rstest::rstest]
    #[case("/data/1", Some(1))]
    #[case("/data/0/attributes/hpo_term_id", None)]
    #[case("/data/12", Some(12))]
    fn pointer_index(
        #[case] pointer: &str,
        #[case] expected: Option<usize>,
    ) -> Result<(), anyhow::Error> {
        let error: ApiError = serde_json::from_value(serde_json::json!({
            "detail": "Invalid HPO term",
            "source": {"pointer": pointer},
        }))?;

        assert_eq!(error.pointer_index(), expected);
        assert!(error.detail_is("Invalid HPO term"));

        Ok(())
    }

    #[test]
    fn create_patient_sends_json_api_request() -> Result<(), anyhow::Error> {
        let (url, server) = test_server::serve(vec![(
            201,
            serde_json::json!({"data": [{
                "id": 1001,
                "type": "Patient",
                "attributes": {"clinical_reference": "12345"},
                "relationships": {"People": {"data": [{"id": 2002, "type": "Person"}]}},
            }]})
            .to_string(),
        )]);

        let outcome = registry(&url).create_patient(&new_patient())?;

        let patients = match outcome {
            Outcome::Accepted(patients) => patients,
            Outcome::Rejected(errors) => panic!("rejected: {:?}", errors),
        };
        assert_eq!(patients[0].id, RemoteId::from("1001"));
        assert_eq!(patients[0].person_id(), Some(&RemoteId::from("2002")));

        let captured = server.join().expect("server panicked");
        assert_eq!(captured[0].request_line, "POST /api/patients HTTP/1.1");
        assert_eq!(captured[0].header("content-type"), Some("application/vnd.api+json"));
        assert_eq!(captured[0].header("x-auth-token-client"), Some("client-token"));
        assert_eq!(captured[0].header("x-auth-token-account"), Some("user-token"));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&captured[0].body)?,
            serde_json::json!({"data": {
                "type": "Patient",
                "attributes": {
                    "contact_account_id": 42,
                    "chromosomal_sex": "46_xx",
                    "has_aneuploidy": false,
                    "clinical_reference": "12345",
                    "has_consent": false,
                },
            }})
        );

        Ok(())
    }

    #[test]
    fn rejected_phenotypes_carry_errors() -> Result<(), anyhow::Error> {
        let (url, server) = test_server::serve(vec![(
            422,
            serde_json::json!({"errors": [{
                "detail": "Invalid HPO term",
                "source": {"pointer": "/data/1"},
            }]})
            .to_string(),
        )]);
        let person_id = RemoteId::from("2002");
        let phenotypes = vec![
            Phenotype::present(&person_id, "HP:0000119"),
            Phenotype::present(&person_id, "HP:9999999"),
        ];

        let outcome = registry(&url).create_phenotypes(&phenotypes)?;

        match outcome {
            Outcome::Rejected(errors) => assert_eq!(errors[0].pointer_index(), Some(1)),
            Outcome::Accepted(()) => panic!("phenotypes unexpectedly accepted"),
        }
        let captured = server.join().expect("server panicked");
        assert_eq!(captured[0].request_line, "POST /api/phenotypes HTTP/1.1");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&captured[0].body)?,
            serde_json::json!({"data": [
                {"type": "Phenotype", "attributes": {"person_id": 2002, "hpo_term_id": "0000119", "is_present": true}},
                {"type": "Phenotype", "attributes": {"person_id": 2002, "hpo_term_id": "9999999", "is_present": true}},
            ]})
        );

        Ok(())
    }

    #[test]
    fn create_variant_body() -> Result<(), anyhow::Error> {
        let (url, server) = test_server::serve(vec![(201, String::from(r#"{"data": []}"#))]);
        let variant = NormalizedVariant {
            person_id: RemoteId::from("2002"),
            variant_class: VariantClass::SequenceVariant,
            assembly: GenomeRelease::Grch38,
            chr: "12".into(),
            start: "21912765".into(),
            ref_sequence: "G".into(),
            alt_sequence: "GA".into(),
            inheritance: "unknown".into(),
            genotype: Zygosity::Heterozygous,
            can_be_public: false,
        };

        assert_eq!(registry(&url).create_variant(&variant)?, Outcome::Accepted(()));

        let captured = server.join().expect("server panicked");
        let body: serde_json::Value = serde_json::from_str(&captured[0].body)?;
        assert_eq!(
            body,
            serde_json::json!({"data": {
                "type": "Variant",
                "attributes": {
                    "person_id": 2002,
                    "variant_class": "sequence_variant",
                    "assembly": "GRCh38",
                    "chr": "12",
                    "start": "21912765",
                    "ref_sequence": "G",
                    "alt_sequence": "GA",
                    "inheritance": "unknown",
                    "genotype": "heterozygous",
                    "can_be_public": false,
                },
            }})
        );

        Ok(())
    }

    #[test]
    fn list_patients_and_people() -> Result<(), anyhow::Error> {
        let (url, server) = test_server::serve(vec![
            (
                200,
                serde_json::json!({"data": [
                    {"id": 7, "attributes": {"clinical_reference": "other"}},
                    {"id": 1001, "attributes": {"clinical_reference": "12345"}},
                ]})
                .to_string(),
            ),
            (200, serde_json::json!({"data": [{"id": 2002}]}).to_string()),
        ]);
        let registry = registry(&url);

        let patients = registry.list_patients()?;
        let people = registry.people_for_patient(&patients[1].id)?;

        assert_eq!(patients.len(), 2);
        assert_eq!(patients[1].attributes.clinical_reference.as_deref(), Some("12345"));
        assert_eq!(people[0].id, RemoteId::from("2002"));
        let captured = server.join().expect("server panicked");
        assert_eq!(captured[0].request_line, "GET /api/patients HTTP/1.1");
        assert_eq!(captured[1].request_line, "GET /api/patients/1001/people HTTP/1.1");

        Ok(())
    }

    #[test]
    fn status_without_errors_is_unexpected() {
        let (url, server) = test_server::serve(vec![(404, String::new())]);

        let result = registry(&url).list_patients();

        assert!(result.is_err());
        server.join().expect("server panicked");
    }
}
