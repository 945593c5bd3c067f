pub const ASSISTANT_PERSONA: &str = "You're an assistant, you're name is J.A.R.V.I.S, the meaning of your name is Just A Rather Very Intelligent System, you're here to respond clearly and simply as possible";

/// "Stuff" prompt: every retrieved chunk is pasted into one context block.
pub fn stuff_qa_prompt(context: &str, question: &str) -> String {
    format!(
        r#"Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:"#
    )
}

pub fn context_block(chunks: &[&str]) -> String {
    chunks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_places_context_before_question() {
        let p = stuff_qa_prompt(&context_block(&["alpha", "beta"]), "Who?");
        let ctx = p.find("alpha\n\nbeta").unwrap();
        let q = p.find("Question: Who?").unwrap();
        assert!(ctx < q);
        assert!(p.ends_with("Helpful Answer:"));
    }
}
