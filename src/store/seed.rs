//! Reference hospitals loaded on first start.

use crate::models::NewHospital;

const DEFAULT_PACKAGES: &str = "General Surgery,Emergency Care,Maternity Care";

pub fn empaneled_hospitals() -> Vec<NewHospital> {
    [
        (
            "AIIMS Delhi",
            "AIIMS-DEL-001",
            "Ansari Nagar, New Delhi",
            "New Delhi",
            "Delhi",
            "110029",
            "011-26588500",
            "Cardiology,Neurology,Oncology,Orthopedics,General Surgery",
            28.5672,
            77.2100,
        ),
        (
            "Safdarjung Hospital",
            "SFDJ-DEL-002",
            "Safdarjung Enclave, New Delhi",
            "New Delhi",
            "Delhi",
            "110029",
            "011-26165060",
            "General Medicine,Pediatrics,Gynecology,Emergency Care",
            28.5678,
            77.2089,
        ),
        (
            "Government Medical College, Kerala",
            "GMC-KER-003",
            "Thiruvananthapuram, Kerala",
            "Thiruvananthapuram",
            "Kerala",
            "695011",
            "0471-2528300",
            "General Medicine,Surgery,Pediatrics,Cardiology",
            8.5241,
            76.9366,
        ),
    ]
    .into_iter()
    .map(
        |(name, code, address, city, state, postal_code, phone, specialties, latitude, longitude)| NewHospital {
            name: name.to_string(),
            code: code.to_string(),
            address: address.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            postal_code: postal_code.to_string(),
            phone: phone.to_string(),
            specialties: specialties.to_string(),
            latitude,
            longitude,
            packages: DEFAULT_PACKAGES.to_string(),
        },
    )
    .collect()
}
