//! Instruction prompts for vision-based invoice extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the extraction schema the model is asked
//!    to fill and the [`crate::schema`] types that parse the answer must
//!    evolve together; keeping the field list in one place makes drift
//!    visible in review.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live model, making schema regressions easy to catch.

/// Build the full-schema extraction prompt.
///
/// The retry marker tells the model whether it is looking at the original
/// upload or the enhanced artifact, which changes how it should weigh its
/// own quality complaints.
pub fn full_extraction_prompt(is_retry: bool) -> String {
    let attempt_note = if is_retry {
        "RETRY ATTEMPT - This is a preprocessed image."
    } else {
        "FIRST ATTEMPT - This is the original image."
    };
    format!("{PROMPT_HEADER}\n\n{attempt_note}\n\n{PROMPT_BODY}")
}

const PROMPT_HEADER: &str =
    "STRICT INSTRUCTION: Only output valid JSON, no markdown or explanations.";

const PROMPT_BODY: &str = r#"First, assess if you can reliably extract data from this image:
- If the image is too blurry, dark, or distorted to read text clearly, set "quality_too_poor" to true
- If you can read most text despite some quality issues, set "quality_too_poor" to false
- If this image is not a valid invoice, set "can_extract_data" to false and add "not invoice" to "quality_issues".

Extract ALL available information from this invoice and return as JSON:
{
  "quality_assessment": {
    "quality_too_poor": true/false,
    "quality_issues": ["list any specific quality problems"],
    "readability_score": "high/medium/low",
    "can_extract_data": true/false,
    "preprocessing_recommended": true/false
  },
  "invoice_header": {
    "vendor_name": "",
    "vendor_address": "",
    "vendor_phone": "",
    "vendor_email": "",
    "vendor_website": "",
    "vendor_gst_number": "",
    "vendor_pan": "",
    "invoice_number": "",
    "invoice_date": "",
    "due_date": "",
    "purchase_order_number": "",
    "reference_number": "",
    "currency": ""
  },
  "customer_details": {
    "customer_name": "",
    "customer_address": "",
    "customer_phone": "",
    "customer_email": "",
    "customer_gst_number": "",
    "customer_pan": "",
    "billing_address": "",
    "shipping_address": "",
    "customer_contact_person": ""
  },
  "line_items": [
    {
      "item_number": "",
      "description": "",
      "hsn_sac_code": "",
      "quantity": "",
      "unit": "",
      "unit_price": "",
      "discount": "",
      "tax_rate": "",
      "tax_amount": "",
      "total_price": ""
    }
  ],
  "financial_summary": {
    "subtotal": "",
    "total_discount": "",
    "taxable_amount": "",
    "cgst": "",
    "sgst": "",
    "igst": "",
    "cess": "",
    "other_charges": "",
    "shipping_charges": "",
    "total_tax_amount": "",
    "round_off": "",
    "total_amount": "",
    "amount_in_words": ""
  },
  "payment_details": {
    "payment_terms": "",
    "payment_method": "",
    "bank_name": "",
    "account_number": "",
    "ifsc_code": "",
    "branch": "",
    "upi_id": "",
    "advance_paid": "",
    "balance_due": ""
  },
  "terms_and_conditions": {
    "payment_terms": "",
    "delivery_terms": "",
    "warranty_terms": "",
    "return_policy": "",
    "late_payment_charges": "",
    "jurisdiction": "",
    "other_conditions": []
  },
  "additional_info": {
    "notes": "",
    "special_instructions": "",
    "delivery_date": "",
    "place_of_supply": "",
    "reverse_charge": "",
    "document_type": "",
    "series": "",
    "authorised_signatory": "",
    "stamp_or_seal": "",
    "qr_code_present": ""
  },
  "detection_metadata": {
    "tables_detected": true/false,
    "handwriting_detected": true/false,
    "logo_detected": true/false,
    "stamp_detected": true/false,
    "signature_detected": true/false,
    "barcode_qr_detected": true/false,
    "multi_page_document": true/false,
    "document_quality": "high/medium/low",
    "extraction_confidence": "high/medium/low",
    "unclear_fields": []
  }
}

INSTRUCTIONS:
- Be honest about image quality in the quality_assessment section
- If quality_too_poor is true, still try to extract what you can see
- For missing/unclear fields, use "N/A"

CURRENCY DETECTION - IMPORTANT:
- ALWAYS preserve currency symbols in amounts: $154.06, ₹10,000, €500, etc.
- Include currency symbols in ALL amount fields: total_amount, subtotal, unit_price, etc.
- Do NOT extract just numbers - include the currency symbol with the number
- Look for currency symbols: ₹, $, €, £, ¥, etc.
- Look for currency codes: INR, USD, EUR, GBP, etc.
- Look for currency words: Rupees, Dollars, Euros, Pounds, etc.
- Extract currency in BOTH invoice_header and financial_summary sections
- If amounts have symbols like $100.00, preserve the $ in the JSON output

- If text is completely unreadable due to quality, mention this in quality_issues
- Extract ALL visible text and data fields
- For terms and conditions, extract the full text even if lengthy
- Include any fine print, disclaimers, or legal text
- Capture payment terms like "Net 30", "Due on receipt", etc.
- Extract tax breakdowns (CGST, SGST, IGST) if present
- Include any special notes, delivery instructions, or remarks
- Identify HSN/SAC codes for items if visible
- Extract complete addresses with pin codes
- Include contact details like phone, email, website
- Capture bank details for payments
- Note any stamps, signatures, or authentication marks
- Return only valid JSON without any explanation."#;

/// Reduced-schema prompt used when the full response fails to parse.
///
/// Large invoices blow through the generation cap and truncate; asking for
/// a summary with a handful of sample items keeps the recovery response
/// short enough to survive a much smaller cap.
pub const SIMPLIFIED_EXTRACTION_PROMPT: &str = r#"STRICT INSTRUCTION: Only output valid JSON, no markdown or explanations.

This is a large invoice. Extract key information and SUMMARIZE line items instead of listing all individually:

{
  "quality_assessment": {
    "quality_too_poor": false,
    "quality_issues": ["Large document - simplified extraction"],
    "readability_score": "high",
    "can_extract_data": true,
    "preprocessing_recommended": false
  },
  "invoice_header": {
    "vendor_name": "",
    "vendor_address": "",
    "invoice_number": "",
    "invoice_date": ""
  },
  "customer_details": {
    "customer_name": "",
    "customer_address": ""
  },
  "line_items_summary": {
    "total_line_items": 0,
    "sample_items": ["List first 3-5 items only"],
    "total_value": "",
    "note": "Large document - showing sample items only"
  },
  "financial_summary": {
    "total_amount": "",
    "currency": ""
  },
  "terms_and_conditions": {
    "payment_terms": "",
    "other_conditions": []
  }
}

Extract main invoice details and count/sample the line items instead of listing all items individually."#;
