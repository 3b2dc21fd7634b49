//! FHIR resource types and the registry that resolves them by name.
//!
//! Authorization code never constructs resources to learn their type. It asks
//! a [`ResourceTypeResolver`] whether a name denotes a resource type the
//! server supports, and receives a [`ResourceType`] descriptor back.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Resource types defined by FHIR R4 (4.0.1).
pub const R4_RESOURCE_TYPES: &[&str] = &[
    "Account",
    "ActivityDefinition",
    "AdverseEvent",
    "AllergyIntolerance",
    "Appointment",
    "AppointmentResponse",
    "AuditEvent",
    "Basic",
    "Binary",
    "BiologicallyDerivedProduct",
    "BodyStructure",
    "Bundle",
    "CapabilityStatement",
    "CarePlan",
    "CareTeam",
    "CatalogEntry",
    "ChargeItem",
    "ChargeItemDefinition",
    "Claim",
    "ClaimResponse",
    "ClinicalImpression",
    "CodeSystem",
    "Communication",
    "CommunicationRequest",
    "CompartmentDefinition",
    "Composition",
    "ConceptMap",
    "Condition",
    "Consent",
    "Contract",
    "Coverage",
    "CoverageEligibilityRequest",
    "CoverageEligibilityResponse",
    "DetectedIssue",
    "Device",
    "DeviceDefinition",
    "DeviceMetric",
    "DeviceRequest",
    "DeviceUseStatement",
    "DiagnosticReport",
    "DocumentManifest",
    "DocumentReference",
    "EffectEvidenceSynthesis",
    "Encounter",
    "Endpoint",
    "EnrollmentRequest",
    "EnrollmentResponse",
    "EpisodeOfCare",
    "EventDefinition",
    "Evidence",
    "EvidenceVariable",
    "ExampleScenario",
    "ExplanationOfBenefit",
    "FamilyMemberHistory",
    "Flag",
    "Goal",
    "GraphDefinition",
    "Group",
    "GuidanceResponse",
    "HealthcareService",
    "ImagingStudy",
    "Immunization",
    "ImmunizationEvaluation",
    "ImmunizationRecommendation",
    "ImplementationGuide",
    "InsurancePlan",
    "Invoice",
    "Library",
    "Linkage",
    "List",
    "Location",
    "Measure",
    "MeasureReport",
    "Media",
    "Medication",
    "MedicationAdministration",
    "MedicationDispense",
    "MedicationKnowledge",
    "MedicationRequest",
    "MedicationStatement",
    "MedicinalProduct",
    "MedicinalProductAuthorization",
    "MedicinalProductContraindication",
    "MedicinalProductIndication",
    "MedicinalProductIngredient",
    "MedicinalProductInteraction",
    "MedicinalProductManufactured",
    "MedicinalProductPackaged",
    "MedicinalProductPharmaceutical",
    "MedicinalProductUndesirableEffect",
    "MessageDefinition",
    "MessageHeader",
    "MolecularSequence",
    "NamingSystem",
    "NutritionOrder",
    "Observation",
    "ObservationDefinition",
    "OperationDefinition",
    "OperationOutcome",
    "Organization",
    "OrganizationAffiliation",
    "Parameters",
    "Patient",
    "PaymentNotice",
    "PaymentReconciliation",
    "Person",
    "PlanDefinition",
    "Practitioner",
    "PractitionerRole",
    "Procedure",
    "Provenance",
    "Questionnaire",
    "QuestionnaireResponse",
    "RelatedPerson",
    "RequestGroup",
    "ResearchDefinition",
    "ResearchElementDefinition",
    "ResearchStudy",
    "ResearchSubject",
    "RiskAssessment",
    "RiskEvidenceSynthesis",
    "Schedule",
    "SearchParameter",
    "ServiceRequest",
    "Slot",
    "Specimen",
    "SpecimenDefinition",
    "StructureDefinition",
    "StructureMap",
    "Subscription",
    "Substance",
    "SubstanceNucleicAcid",
    "SubstancePolymer",
    "SubstanceProtein",
    "SubstanceReferenceInformation",
    "SubstanceSourceMaterial",
    "SubstanceSpecification",
    "SupplyDelivery",
    "SupplyRequest",
    "Task",
    "TerminologyCapabilities",
    "TestReport",
    "TestScript",
    "ValueSet",
    "VerificationResult",
    "VisionPrescription",
];

/// Descriptor of a resource type the server knows about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    /// The type name, e.g. `Observation`.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns true if this descriptor is the type called `name`.
    pub fn is(&self, name: &str) -> bool {
        self.0 == name
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_valid_resource_type_name(s) {
            Ok(ResourceType(s.to_string()))
        } else {
            Err(CoreError::invalid_resource_type(s))
        }
    }
}

/// Validate if a string is a valid FHIR resource type name
pub fn is_valid_resource_type_name(name: &str) -> bool {
    // FHIR resource type names must start with uppercase letter and contain only letters
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().all(|c| c.is_ascii_alphabetic())
}

/// Resolves a resource type name to its descriptor.
///
/// Implementations must be cheap, synchronous and free of side effects; they
/// are called on the request path for every granted scope.
pub trait ResourceTypeResolver: Send + Sync {
    /// Returns `None` when `name` is not a supported resource type.
    fn resolve(&self, name: &str) -> Option<ResourceType>;
}

impl<F> ResourceTypeResolver for F
where
    F: Fn(&str) -> Option<ResourceType> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Option<ResourceType> {
        self(name)
    }
}

/// In-memory registry of supported resource type names.
///
/// Lookups are exact and case-sensitive: `observation` does not resolve to
/// `Observation`.
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeRegistry {
    types: IndexSet<String>,
}

impl ResourceTypeRegistry {
    /// Create a registry holding every FHIR R4 resource type.
    pub fn r4() -> Self {
        Self {
            types: R4_RESOURCE_TYPES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Register an additional (custom) resource type.
    pub fn register(&mut self, name: &str) -> Result<(), CoreError> {
        let resource_type: ResourceType = name.parse()?;
        self.types.insert(resource_type.0);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl ResourceTypeResolver for ResourceTypeRegistry {
    fn resolve(&self, name: &str) -> Option<ResourceType> {
        self.types.get(name).map(|n| ResourceType(n.clone()))
    }
}
